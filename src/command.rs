//! Post-capture menu commands.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use thiserror::Error;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Summary,
    Histogram,
    Pairs,
    Flows,
    Lifecycle,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(pub String);

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Summary,
        Command::Histogram,
        Command::Pairs,
        Command::Flows,
        Command::Lifecycle,
        Command::Quit,
    ];

    pub fn key(&self) -> char {
        match self {
            Command::Summary => 'a',
            Command::Histogram => 'h',
            Command::Pairs => 'u',
            Command::Flows => 'm',
            Command::Lifecycle => 'l',
            Command::Quit => 'q',
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Command::Summary => "capture summary",
            Command::Histogram => "frame size histogram",
            Command::Pairs => "unique endpoint pairs",
            Command::Flows => "flows by volume",
            Command::Lifecycle => "TCP connection lifecycle",
            Command::Quit => "quit",
        }
    }

    /// Menu text listing every command.
    pub fn menu() -> String {
        Self::ALL.iter().map(|cmd| format!("  [{}] {}\n", cmd.key(), cmd)).collect()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        Self::ALL
            .into_iter()
            .find(|cmd| input.len() == 1 && input.starts_with(cmd.key()))
            .ok_or_else(|| UnknownCommand(input.to_string()))
    }
}

impl Session {
    /// Renders the panel for `command`; `None` for [`Command::Quit`].
    pub fn execute(&self, command: Command) -> Option<String> {
        let panel = match command {
            Command::Summary => self.summary().to_string(),
            Command::Histogram => self.histogram().to_string(),
            Command::Pairs => self.flow_report().pairs_panel(),
            Command::Flows => self.flow_report().to_string(),
            Command::Lifecycle => self.lifecycle_report().to_string(),
            Command::Quit => return None,
        };
        Some(panel)
    }
}

/// Reads one command per line from `input` until `q` or end of input,
/// writing each panel to `out`.
pub fn run_menu(session: &Session, input: impl BufRead, mut out: impl Write) -> io::Result<()> {
    write!(out, "\n{}> ", Command::menu())?;
    out.flush()?;

    for line in input.lines() {
        match line?.parse::<Command>() {
            Ok(command) => match session.execute(command) {
                Some(panel) => writeln!(out, "{panel}")?,
                None => return Ok(()),
            },
            Err(e) => writeln!(out, "{e}")?,
        }
        write!(out, "\n{}> ", Command::menu())?;
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::config::{SessionConfig, SourceSpec};

    fn empty_session() -> Session {
        Session::new(SessionConfig::new(SourceSpec::Interface("lo".into()))).unwrap()
    }

    fn menu_output(session: &Session, input: &str) -> String {
        let mut out = Vec::new();
        run_menu(session, Cursor::new(input), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn prompts(out: &str) -> usize {
        out.matches(&format!("{}> ", Command::menu())).count()
    }

    #[test]
    fn test_menu_reports_unknown_keys_and_keeps_going() {
        let out = menu_output(&empty_session(), "x\na\nq\n");
        let unknown = out.find("unknown command 'x'").unwrap();
        let summary = out.find("Capture summary").unwrap();
        assert!(unknown < summary);
        assert_eq!(prompts(&out), 3);
    }

    #[test]
    fn test_menu_stops_at_quit() {
        let out = menu_output(&empty_session(), "q\na\nh\n");
        assert!(!out.contains("Capture summary"));
        assert_eq!(prompts(&out), 1);
    }

    #[test]
    fn test_menu_ends_with_input() {
        let session = empty_session();
        let out = menu_output(&session, "h\n");
        assert!(out.contains(&session.histogram().to_string()));
        assert!(out.ends_with("> "));
    }

    #[test]
    fn test_parse_menu_keys() {
        assert_eq!("a".parse::<Command>(), Ok(Command::Summary));
        assert_eq!(" h\n".parse::<Command>(), Ok(Command::Histogram));
        assert_eq!("u".parse::<Command>(), Ok(Command::Pairs));
        assert_eq!("m".parse::<Command>(), Ok(Command::Flows));
        assert_eq!("l".parse::<Command>(), Ok(Command::Lifecycle));
        assert_eq!("q".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn test_unknown_input_is_rejected() {
        assert_eq!(
            "x".parse::<Command>(),
            Err(UnknownCommand("x".to_string()))
        );
        assert!("".parse::<Command>().is_err());
        assert!("aa".parse::<Command>().is_err());
    }

    #[test]
    fn test_menu_lists_every_key() {
        let menu = Command::menu();
        for cmd in Command::ALL {
            assert!(menu.contains(&format!("[{}]", cmd.key())));
        }
    }

    #[test]
    fn test_execute_on_empty_session() {
        let session = Session::new(SessionConfig::new(SourceSpec::Interface("lo".into()))).unwrap();
        for cmd in Command::ALL {
            let panel = session.execute(cmd);
            assert_eq!(panel.is_none(), cmd == Command::Quit);
        }
        let summary = session.execute(Command::Summary).unwrap();
        assert!(summary.contains("Capture summary"));
    }
}
