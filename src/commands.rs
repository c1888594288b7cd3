/// Command mode (`:`) commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Whether the command needs an argument
  pub takes_arg: bool,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "open",
    aliases: &["o", "practice"],
    description: "Practice another content id",
    takes_arg: true,
  },
  Command {
    name: "restart",
    aliases: &["r", "reset"],
    description: "Start the current content over",
    takes_arg: false,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit listen-drill",
    takes_arg: false,
  },
];

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
  Open(String),
  Restart,
  Quit,
}

/// Get autocomplete suggestions for the command word of `input`
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input
    .split_whitespace()
    .next()
    .unwrap_or_default()
    .to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    if cmd.name == input_lower {
      matches.push((cmd, 0));
    } else if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
    } else if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    } else if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve `input` to an invocation, using the highlighted suggestion for
/// the command word. Returns `None` for unknown commands or a missing
/// argument.
pub fn parse(input: &str, selected: usize) -> Option<Invocation> {
  let suggestions = get_suggestions(input);
  let cmd = suggestions.get(selected).or_else(|| suggestions.first())?;
  let arg = input.split_whitespace().nth(1);

  match (cmd.name, arg) {
    ("open", Some(id)) => Some(Invocation::Open(id.to_string())),
    ("open", None) => None,
    ("restart", _) => Some(Invocation::Restart),
    ("quit", _) => Some(Invocation::Quit),
    _ => None,
  }
}
