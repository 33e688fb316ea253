//! Interactive answers on a terminal, defaults everywhere else.

use std::io::{BufRead, IsTerminal, Write};

use chronicle_sync::{AssumeDefaults, AssumeYes, Decision, Prompter, Question};

/// Asks on stderr, reads one line from stdin. An empty answer takes the
/// question's default; anything unreadable does too.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, question: &Question) -> Decision {
        let default = question.default_decision();
        let hint = match default {
            Decision::Accept => "[Y/n]",
            Decision::Decline => "[y/N]",
        };
        let stdin = std::io::stdin();
        loop {
            eprint!("{question} {hint} ");
            let _ = std::io::stderr().flush();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => return default,
                Ok(_) => {}
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "" => return default,
                "y" | "yes" => return Decision::Accept,
                "n" | "no" => return Decision::Decline,
                _ => eprintln!("please answer y or n"),
            }
        }
    }
}

/// `--yes` accepts everything; a non-terminal stdin gets the defaults.
pub fn select(assume_yes: bool) -> Box<dyn Prompter> {
    if assume_yes {
        Box::new(AssumeYes)
    } else if std::io::stdin().is_terminal() {
        Box::new(TerminalPrompter)
    } else {
        tracing::debug!("stdin is not a terminal, using default answers");
        Box::new(AssumeDefaults)
    }
}
