use std::io::IsTerminal;

/// Check if stdin is connected to a TTY
pub fn is_stdin_tty() -> bool {
    std::io::stdin().is_terminal()
}

/// Check if stderr is connected to a TTY
pub fn is_stderr_tty() -> bool {
    std::io::stderr().is_terminal()
}

/// Emoji prefixes only on an interactive stderr, and never with NO_EMOJI set
pub fn should_use_emoji(no_emoji_flag: bool) -> bool {
    if no_emoji_flag || std::env::var_os("NO_EMOJI").is_some() {
        return false;
    }
    is_stderr_tty()
}
