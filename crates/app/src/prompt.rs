//! Password prompts on the controlling terminal. Input is echoed as `*`.

use std::{error::Error, io::Write};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal::{self, ClearType},
};

type PromptResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

struct RawMode;

impl RawMode {
    fn enter() -> PromptResult<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn notice(message: &str) -> PromptResult<()> {
    let mut err = std::io::stderr();
    execute!(
        err,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(message),
        Print("\r\n")
    )?;
    Ok(())
}

pub fn password(prompt: &str) -> PromptResult<String> {
    let _raw = RawMode::enter()?;
    let mut err = std::io::stderr();
    execute!(
        err,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    err.flush()?;

    let mut typed = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => break,
            KeyCode::Backspace if typed.pop().is_some() => {
                execute!(err, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(err, Print("\r\n"))?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                typed.push(ch);
                execute!(err, Print("*"))?;
            }
            _ => {}
        }
        err.flush()?;
    }

    execute!(err, Print("\r\n"))?;
    err.flush()?;
    Ok(typed)
}

/// Asks for a new password and its confirmation, three tries at most.
pub fn new_password() -> PromptResult<String> {
    for _ in 0..3 {
        let first = password("New password: ")?;
        if first.is_empty() {
            notice("Password must not be empty.")?;
            continue;
        }
        if password("Repeat password: ")? == first {
            return Ok(first);
        }
        notice("Passwords do not match.")?;
    }
    Err("too many attempts".into())
}
