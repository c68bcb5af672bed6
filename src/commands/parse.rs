/// A chat line split into what the dispatcher needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `/name arg1 arg2 ...`, name lowercased without the leading '/'
    Command { name: String, args: Vec<String> },
    /// Anything that isn't a command
    Text(String),
    /// A command addressed to a different bot
    Ignored,
}

/// Tokenize one incoming message
///
/// The first whitespace-separated token is the command when it starts with
/// '/'. A `/name@bot` suffix is accepted when it matches `bot_username`
/// (case-insensitive) or when no username is known.
pub fn parse_input(text: &str, bot_username: Option<&str>) -> Input {
    let mut tokens = text.split_whitespace();

    let Some(command) = tokens.next().and_then(|first| first.strip_prefix('/')) else {
        return Input::Text(text.to_string());
    };

    let (name, target) = match command.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (command, None),
    };

    // A bare "/" carries no command
    if name.is_empty() {
        return Input::Text(text.to_string());
    }

    if let (Some(target), Some(own)) = (target, bot_username)
        && !target.eq_ignore_ascii_case(own.trim_start_matches('@'))
    {
        log::debug!("Ignoring /{} addressed to @{}", name, target);
        return Input::Ignored;
    }

    Input::Command {
        name: name.to_lowercase(),
        args: tokens.map(str::to_string).collect(),
    }
}
