mod appsettings;
mod controller;
mod desktop;
mod view;

use std::sync::Arc;

use appsettings::AppSettings;
use controller::HydrationController;
use desktop::DesktopNotificationSink;
use tokio::io::{AsyncBufReadExt, BufReader};
use view::Command;
use waterping_scheduler::clock::LocalClock;
use waterping_storage::JsonFileSettingsStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let app_settings = AppSettings::new()?;
    let settings_path = app_settings.settings_path();
    log::info!("Using settings file {}", settings_path.display());

    let controller = HydrationController::start(
        Arc::new(JsonFileSettingsStore::new(settings_path)),
        Arc::new(DesktopNotificationSink::new(&app_settings.notification)),
        Arc::new(LocalClock),
        app_settings.reminder_message(),
    )
    .await;

    println!("Daily Water Ping. Type `help` for commands.");
    println!("{}", view::render_status(&controller.status()));

    let result = run(&controller).await;

    controller.shutdown().await?;
    result
}

async fn run(controller: &HydrationController) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, shutting down");
                return Ok(());
            }
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => return Ok(()),
            },
        };

        match view::parse_command(&line) {
            Ok(Command::Quit) => return Ok(()),
            Ok(command) => match view::handle_command(controller, command).await {
                Ok(output) => println!("{output}"),
                Err(error) => println!("{error}"),
            },
            Err(message) => println!("{message}"),
        }
    }
}
