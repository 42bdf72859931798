use std::io::{self, BufRead, Write};

use dutylink_motor::Duty;
use dutylink_node::{MotorClient, NodeError};

use crate::cmd::{get, ConsoleArgs};
use crate::exit::{io_error, node_error, CliResult, SUCCESS};

pub fn run(args: ConsoleArgs) -> CliResult<i32> {
    // Gets queue behind fades of any length, so replies are awaited without a limit.
    let mut client = get::open(&args.node, None)?;
    writeln!(io::stdout(), "connected to {}", client.peer_addr())
        .map_err(|err| io_error("write failed", err))?;

    let stdin = io::stdin();
    Console::new(&mut client, stdin.lock(), io::stdout()).run()?;
    client.close();
    Ok(SUCCESS)
}

/// What the console needs from a node connection.
pub trait DutyLink {
    fn get(&mut self) -> Result<Duty, NodeError>;
    fn set(&mut self, target: Duty, fade_ms: u32) -> Result<(), NodeError>;
}

impl DutyLink for MotorClient {
    fn get(&mut self) -> Result<Duty, NodeError> {
        self.get_duty()
    }

    fn set(&mut self, target: Duty, fade_ms: u32) -> Result<(), NodeError> {
        self.set_duty(target, fade_ms)
    }
}

impl<L: DutyLink + ?Sized> DutyLink for &mut L {
    fn get(&mut self) -> Result<Duty, NodeError> {
        (**self).get()
    }

    fn set(&mut self, target: Duty, fade_ms: u32) -> Result<(), NodeError> {
        (**self).set(target, fade_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Duty only; applied with no fade.
    Direct,
    /// `duty,fade_ms`.
    Fade,
}

impl Mode {
    fn name(self) -> &'static str {
        match self {
            Mode::Direct => "direct control",
            Mode::Fade => "fade control",
        }
    }

    fn prompt(self) -> &'static str {
        match self {
            Mode::Direct => "Enter new duty cycle or q to quit.",
            Mode::Fade => "Enter new duty cycle and fade time separated by a comma or q to quit.",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            Mode::Direct => "Please enter a number between -100 and 100 or q.",
            Mode::Fade => {
                "Please enter a number between -100 and 100 and a non-negative fade time in ms, or q."
            }
        }
    }

    fn parse(self, line: &str) -> Option<(Duty, u32)> {
        match self {
            Mode::Direct => parse_duty(line).map(|duty| (duty, 0)),
            Mode::Fade => parse_duty_and_fade(line),
        }
    }
}

/// Interactive operator session over one node connection.
///
/// End of input behaves like `q`, so a closed stdin still stops the motor.
pub struct Console<L, R, W> {
    link: L,
    input: R,
    output: W,
}

impl<L: DutyLink, R: BufRead, W: Write> Console<L, R, W> {
    pub fn new(link: L, input: R, output: W) -> Self {
        Self {
            link,
            input,
            output,
        }
    }

    /// Run the mode menu until the operator quits.
    pub fn run(&mut self) -> CliResult<()> {
        loop {
            self.write(
                "Select mode:\n\t(1) - direct control\n\t(2) - fade control\n\t(q) - quit\n> ",
            )?;
            let Some(line) = self.read_line()? else {
                self.write("Goodbye!\n")?;
                return Ok(());
            };

            match line.as_str() {
                "1" => self.control(Mode::Direct)?,
                "2" => self.control(Mode::Fade)?,
                "q" => {
                    self.write("Goodbye!\n")?;
                    return Ok(());
                }
                other => self.write(&format!("{other} is not a valid selection\n\n"))?,
            }
        }
    }

    fn control(&mut self, mode: Mode) -> CliResult<()> {
        let mut rejected: Option<String> = None;
        loop {
            let duty = self
                .link
                .get()
                .map_err(|err| node_error("get failed", err))?;
            if let Some(entry) = rejected.take() {
                self.write(&format!("{entry} is not a valid entry.\n{}\n\n", mode.hint()))?;
            }
            self.write(&format!(
                "Current duty cycle is {duty}%. {}\n> ",
                mode.prompt()
            ))?;

            let line = self.read_line()?.unwrap_or_else(|| "q".to_string());
            if line == "q" {
                self.link
                    .set(Duty::ZERO, 0)
                    .map_err(|err| node_error("stop failed", err))?;
                self.write(&format!("Leaving {}. Motor will stop.\n\n", mode.name()))?;
                return Ok(());
            }

            match mode.parse(&line) {
                Some((target, fade_ms)) => {
                    self.write("Please wait\n")?;
                    self.link
                        .set(target, fade_ms)
                        .map_err(|err| node_error("set failed", err))?;
                }
                None => rejected = Some(line),
            }
        }
    }

    fn read_line(&mut self) -> CliResult<Option<String>> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|err| io_error("read failed", err))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn write(&mut self, text: &str) -> CliResult<()> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush())
            .map_err(|err| io_error("write failed", err))
    }
}

/// A signed integer in -100..=100, optionally with a leading sign.
fn parse_duty(token: &str) -> Option<Duty> {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Duty::new(token.parse().ok()?).ok()
}

/// `duty,fade_ms` where the fade is unsigned digits.
fn parse_duty_and_fade(line: &str) -> Option<(Duty, u32)> {
    let (duty, fade) = line.split_once(',')?;
    let fade = fade.trim();
    if fade.is_empty() || !fade.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((parse_duty(duty.trim())?, fade.parse().ok()?))
}
