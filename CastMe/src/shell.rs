//! Interactive command shell.
//!
//! One command per line, first word selects the command, everything after
//! it is the argument. Parsing is separated from dispatch so it can be
//! tested without a player.

use std::io::{self, BufRead, Write};

use tracing::warn;

use cmcontrol::Player;

const PROMPT: &str = ">> ";

const HELP: &str = "\
Commands:
  queue [ALBUM]    (q)  find ALBUM and append its songs; bare, list the queue
  play ALBUM       (p)  clear the queue, queue ALBUM, start playing
  list             (l)  list the queue, or all albums with `list albums`
  playpause        (pp) toggle between playing and paused
  next             (n)  skip to the next queued song
  volume VALUE     (v)  set volume 0-100, or adjust with +N / -N
  switch BACKEND   (s)  hand playback over to BACKEND (chromecast, local)
  clear            (c)  stop playback and empty the queue
  help             (h)  show this message
  quit                  exit";

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Queue(String),
    Play(String),
    ListQueue,
    ListAlbums,
    PlayPause,
    Next,
    VolumeSet(f32),
    VolumeDelta(f32),
    Switch(String),
    Clear,
    Help,
    Quit,
}

#[derive(Debug, PartialEq)]
pub enum ParseError {
    Empty,
    MissingArgument(&'static str),
    BadVolume(String),
    Unknown(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::MissingArgument(what) => write!(f, "missing argument: {what}"),
            ParseError::BadVolume(value) => {
                write!(f, "volume must be a number between 0 and 100, got '{value}'")
            }
            ParseError::Unknown(word) => {
                write!(f, "unknown command '{word}', try 'help'")
            }
        }
    }
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word {
        "" => Err(ParseError::Empty),
        "queue" | "q" => {
            if rest.is_empty() {
                Ok(Command::ListQueue)
            } else {
                Ok(Command::Queue(rest.to_string()))
            }
        }
        "play" | "p" => argument(rest, "album name").map(Command::Play),
        "list" | "l" => {
            if rest.eq_ignore_ascii_case("albums") {
                Ok(Command::ListAlbums)
            } else {
                Ok(Command::ListQueue)
            }
        }
        "playpause" | "pp" => Ok(Command::PlayPause),
        "next" | "n" => Ok(Command::Next),
        "volume" | "v" => parse_volume(rest),
        "switch" | "s" => argument(rest, "backend name").map(Command::Switch),
        "clear" | "c" => Ok(Command::Clear),
        "help" | "h" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

fn argument(rest: &str, what: &'static str) -> Result<String, ParseError> {
    if rest.is_empty() {
        Err(ParseError::MissingArgument(what))
    } else {
        Ok(rest.to_string())
    }
}

/// Volume on the user-facing 0-100 scale. A leading `+` or `-` makes it
/// a relative adjustment.
fn parse_volume(rest: &str) -> Result<Command, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::MissingArgument("volume value"));
    }
    let relative = rest.starts_with('+') || rest.starts_with('-');
    let value: f32 = rest
        .parse()
        .map_err(|_| ParseError::BadVolume(rest.to_string()))?;
    if relative {
        Ok(Command::VolumeDelta(value / 100.0))
    } else if (0.0..=100.0).contains(&value) {
        Ok(Command::VolumeSet(value / 100.0))
    } else {
        Err(ParseError::BadVolume(rest.to_string()))
    }
}

/// Read commands from stdin until `quit` or EOF. Command failures are
/// shown to the user; the loop itself only stops on I/O errors.
pub fn run(player: &mut Player) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("CastMe, playing on '{}'. Type 'help' for commands.", player.current_backend_name());
    loop {
        write!(stdout, "{PROMPT}")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF behaves like quit.
            println!();
            return Ok(());
        }

        let command = match parse(&line) {
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        if command == Command::Quit {
            return Ok(());
        }
        if let Err(err) = dispatch(player, command) {
            warn!(error = %err, "Command failed");
            println!("{err}");
        }
    }
}

fn dispatch(player: &mut Player, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Queue(album) => {
            let name = player.queue_album(&album)?;
            println!("Queued '{name}'");
        }
        Command::Play(album) => {
            player.clear()?;
            let name = player.queue_album(&album)?;
            println!("Playing '{name}'");
            player.force_play()?;
        }
        Command::ListQueue => {
            let songs = player.queue_snapshot();
            if songs.is_empty() {
                println!("The queue is empty");
            }
            for (index, song) in songs.iter().enumerate() {
                println!("{:3}. {song}", index + 1);
            }
        }
        Command::ListAlbums => {
            for name in player.list_albums()? {
                println!("{name}");
            }
        }
        Command::PlayPause => player.playpause()?,
        Command::Next => player.next()?,
        Command::VolumeSet(value) => player.volume_set(value)?,
        Command::VolumeDelta(delta) => player.volume_delta(delta)?,
        Command::Switch(name) => {
            player.switch(&name)?;
            println!("Now playing on '{name}'");
        }
        Command::Clear => {
            player.clear()?;
            println!("Queue cleared");
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_and_aliases_parse_the_same() {
        assert_eq!(parse("queue high voltage"), parse("q high voltage"));
        assert_eq!(
            parse("q high voltage"),
            Ok(Command::Queue("high voltage".to_string()))
        );
        assert_eq!(parse("pp"), Ok(Command::PlayPause));
        assert_eq!(parse("n"), Ok(Command::Next));
        assert_eq!(parse("s local"), Ok(Command::Switch("local".to_string())));
    }

    #[test]
    fn list_splits_on_the_albums_argument() {
        assert_eq!(parse("list"), Ok(Command::ListQueue));
        assert_eq!(parse("l"), Ok(Command::ListQueue));
        assert_eq!(parse("list albums"), Ok(Command::ListAlbums));
    }

    #[test]
    fn volume_is_absolute_or_signed_relative() {
        assert_eq!(parse("volume 50"), Ok(Command::VolumeSet(0.5)));
        assert_eq!(parse("v +10"), Ok(Command::VolumeDelta(0.1)));
        assert_eq!(parse("v -25"), Ok(Command::VolumeDelta(-0.25)));
        assert!(matches!(parse("v 150"), Err(ParseError::BadVolume(_))));
        assert!(matches!(parse("v loud"), Err(ParseError::BadVolume(_))));
    }

    #[test]
    fn whitespace_and_empty_lines_are_tolerated() {
        assert_eq!(parse("  q   back in black  "), Ok(Command::Queue("back in black".to_string())));
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn unknown_words_point_at_help() {
        assert!(matches!(parse("shuffle"), Err(ParseError::Unknown(word)) if word == "shuffle"));
        assert!(matches!(parse("s"), Err(ParseError::MissingArgument(_))));
    }

    #[test]
    fn bare_queue_lists_instead_of_queueing() {
        assert_eq!(parse("queue"), Ok(Command::ListQueue));
        assert_eq!(parse("q"), Ok(Command::ListQueue));
    }
}
