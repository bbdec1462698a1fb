//! Preflight for `vaxline-server`: everything the server checks before it
//! binds, without binding.

use crate::commands::{load_config, runtime, CommandResult};
use vaxline_db::{connect_with_settings, migrations, ping};
use vaxline_nlu::DialogflowResolver;

pub fn run() -> CommandResult {
    let config = match load_config("start") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    if let Err(error) = DialogflowResolver::from_config(&config.dialogflow) {
        return CommandResult::failure(
            "start",
            "resolver_setup",
            format!("dialogflow resolver could not be built: {error}"),
            2,
        );
    }

    let runtime = match runtime("start") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        ping(&pool).await.map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success(
            "start",
            format!(
                "preflight passed; vaxline-server would listen on {}:{}{}",
                config.server.bind_address, config.server.port, config.server.webhook_path
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}
