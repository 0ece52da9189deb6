/// Reserved words recognised in a chat turn, parsed once per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `help` or `?`
    Help,
    /// `reset` or `restart`
    Reset,
    Run,
    Status,
    /// Any message starting with `explain`.
    Explain,
    /// Not a command; an answer or free text.
    Message,
}

impl Command {
    pub fn parse(message: &str) -> Self {
        let lower = message.trim().to_lowercase();
        match lower.as_str() {
            "help" | "?" => Command::Help,
            "reset" | "restart" => Command::Reset,
            "run" => Command::Run,
            "status" => Command::Status,
            other if other.starts_with("explain") => Command::Explain,
            _ => Command::Message,
        }
    }
}
