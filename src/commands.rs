/// Commands reachable from `:` and their autocomplete

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
  Articles,
  Talent,
  TogglePreview,
  ClearCache,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub kind: CommandKind,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "articles",
    aliases: &["a", "blog", "posts"],
    description: "Browse articles",
    kind: CommandKind::Articles,
  },
  Command {
    name: "talent",
    aliases: &["t", "people", "profiles"],
    description: "Browse talent profiles",
    kind: CommandKind::Talent,
  },
  Command {
    name: "preview",
    aliases: &["p", "drafts"],
    description: "Toggle draft content (preview API)",
    kind: CommandKind::TogglePreview,
  },
  Command {
    name: "clear",
    aliases: &["c", "purge"],
    description: "Clear the content cache",
    kind: CommandKind::ClearCache,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit folio",
    kind: CommandKind::Quit,
  },
];

/// Ranked matches for `input`: name before alias, exact before prefix before substring.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();

  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|priority| (cmd, priority)))
    .collect();

  matches.sort_by_key(|(_, priority)| *priority);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

fn rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Resolve typed input to a command; the selected suggestion wins when present.
pub fn resolve(input: &str, selected: usize) -> Option<CommandKind> {
  get_suggestions(input)
    .get(selected)
    .map(|cmd| cmd.kind)
}
