// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{io, thread};

use tokio::sync::mpsc::Sender;
use tracing::{info, span, warn, Level};

use crate::session::SessionCommand;

const INSTRUMENT: &str = "instrument";
const QUIT: &str = "quit";

/// Reads session commands from the terminal on its own thread. Stands in for
/// the instrument picker when running headless.
pub fn monitor_stdin(
    commands_tx: Sender<SessionCommand>,
) -> thread::JoinHandle<Result<(), io::Error>> {
    thread::spawn(move || {
        let span = span!(Level::INFO, "console");
        let _enter = span.enter();

        info!("Console started.");

        loop {
            if !monitor_io(&commands_tx, io::stdin().lock(), io::stdout())? {
                return Ok(());
            }
        }
    })
}

/// Reads and dispatches one command. Returns false once input is exhausted or
/// the session has gone away.
fn monitor_io<R, W>(
    commands_tx: &Sender<SessionCommand>,
    mut reader: R,
    mut writer: W,
) -> Result<bool, io::Error>
where
    R: io::BufRead,
    W: io::Write,
{
    write!(writer, "Command ({} <name>, {}): ", INSTRUMENT, QUIT)?;
    writer.flush()?;
    let mut input = String::default();
    if reader.read_line(&mut input)? == 0 {
        return Ok(false);
    }

    let mut words = input.split_whitespace();
    let command = match (words.next().map(str::to_lowercase).as_deref(), words.next()) {
        (Some(INSTRUMENT), Some(name)) => SessionCommand::SelectInstrument(name.to_string()),
        (Some(QUIT), None) => SessionCommand::Shutdown,
        (None, _) => return Ok(true),
        _ => {
            warn!(input = input.trim(), "Unrecognized input");
            return Ok(true);
        }
    };

    let shutdown = command == SessionCommand::Shutdown;
    if commands_tx.blocking_send(command).is_err() {
        return Ok(false);
    }
    Ok(!shutdown)
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};

    use tokio::sync::mpsc;

    use super::*;

    fn get_command(line: &str) -> Result<(bool, Option<SessionCommand>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<SessionCommand>(1);

        let reader = BufReader::new(line.as_bytes());
        let mut written: Vec<u8> = Vec::new();
        let keep_going = monitor_io(&sender, reader, &mut written)?;
        assert!(String::from_utf8_lossy(&written).starts_with("Command"));

        // Force the sender to close.
        drop(sender);
        Ok((keep_going, receiver.blocking_recv()))
    }

    #[test]
    fn test_console_commands() -> Result<(), io::Error> {
        assert_eq!(
            (
                true,
                Some(SessionCommand::SelectInstrument("organ".to_string()))
            ),
            get_command("instrument organ\n")?
        );
        assert_eq!(
            (
                true,
                Some(SessionCommand::SelectInstrument("Saw".to_string()))
            ),
            get_command("  INSTRUMENT Saw")?
        );
        assert_eq!((false, Some(SessionCommand::Shutdown)), get_command("quit\n")?);
        assert_eq!((true, None), get_command("instrument\n")?);
        assert_eq!((true, None), get_command("dance\n")?);
        assert_eq!((true, None), get_command("\n")?);
        assert_eq!((false, None), get_command("")?);
        Ok(())
    }
}
