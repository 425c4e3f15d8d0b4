use waterping_scheduler::{SchedulerStatus, delivery::PermissionStatus};

use crate::controller::HydrationController;

pub const BLOCKED_MESSAGE: &str =
    "Notifications are blocked. Please enable them in your system settings to receive pings.";

pub const HELP: &str = "\
Commands:
  status           show current settings
  toggle           turn reminders on or off
  on | off         turn reminders on / off
  wake HH:MM       set the wake up time
  sleep HH:MM      set the sleep time
  interval N       remind every N minutes (30, 45, 60 or 90)
  check            check the window right now
  help             show this message
  quit             exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Toggle,
    On,
    Off,
    Wake(String),
    Sleep(String),
    Interval(u32),
    Check,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let argument = parts.next();

    if parts.next().is_some() {
        return Err(format!("Too many arguments for {name:?}. Type `help` for usage."));
    }

    let require = |argument: Option<&str>| {
        argument
            .map(str::to_owned)
            .ok_or_else(|| format!("{name} needs a value. Type `help` for usage."))
    };

    match name.as_str() {
        "" | "status" => Ok(Command::Status),
        "toggle" => Ok(Command::Toggle),
        "on" | "enable" => Ok(Command::On),
        "off" | "disable" => Ok(Command::Off),
        "wake" => require(argument).map(Command::Wake),
        "sleep" => require(argument).map(Command::Sleep),
        "interval" => {
            let value = require(argument)?;
            let minutes = value
                .trim_end_matches('m')
                .parse()
                .map_err(|_| format!("{value:?} is not a number of minutes."))?;
            Ok(Command::Interval(minutes))
        }
        "check" => Ok(Command::Check),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("Unknown command {other:?}. Type `help` for usage.")),
    }
}

pub fn render_status(status: &SchedulerStatus) -> String {
    let settings = &status.settings;
    let state = if settings.is_enabled {
        "Reminders Active"
    } else {
        "Reminders Paused"
    };

    let mut rendered = format!(
        "{state}\n  Activity window: {} - {}\n  Reminder frequency: {}",
        settings.wake_time, settings.sleep_time, settings.interval
    );

    if status.permission == PermissionStatus::Denied {
        rendered.push('\n');
        rendered.push_str(BLOCKED_MESSAGE);
    }

    rendered
}

/// Runs one command against the controller and returns what to print.
pub async fn handle_command(
    controller: &HydrationController,
    command: Command,
) -> anyhow::Result<String> {
    match command {
        Command::Status => {}
        Command::Toggle => {
            controller.toggle().await?;
        }
        Command::On => {
            controller.enable().await?;
        }
        Command::Off => {
            controller.disable().await?;
        }
        Command::Wake(value) => {
            controller.set_wake_time(&value).await?;
        }
        Command::Sleep(value) => {
            controller.set_sleep_time(&value).await?;
        }
        Command::Interval(minutes) => {
            controller.set_interval(minutes).await?;
        }
        Command::Check => {
            controller.check_now().await?;
            return Ok("Checked.".to_owned());
        }
        Command::Help => return Ok(HELP.to_owned()),
        Command::Quit => return Ok(String::new()),
    }

    Ok(render_status(&controller.status()))
}
