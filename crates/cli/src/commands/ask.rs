//! One message through the same pipeline the webhook uses, printed as the
//! TwiML a carrier would receive.

use vaxline_core::config::LoadOptions;
use vaxline_core::conversation::APOLOGY_TEXT;
use vaxline_core::domain::message::OutboundMessage;
use vaxline_server::bootstrap::{self, BootstrapError};
use vaxline_sms::{ReplyChannel, TwilioInbound, TwimlReplyChannel};

use crate::commands::{runtime, CommandResult};

pub fn run(from: &str, text: &str) -> CommandResult {
    let runtime = match runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let app = bootstrap::shared(LoadOptions::default()).await.map_err(classify)?;

        let inbound = TwilioInbound::new(text, from);
        let reply = match inbound.to_inbound_message() {
            Ok(message) => app.conversation.respond(&message, "cli-ask").await,
            Err(_) => OutboundMessage::new(APOLOGY_TEXT),
        };
        Ok::<OutboundMessage, (&'static str, String, u8)>(reply)
    });

    match result {
        Ok(reply) => CommandResult { exit_code: 0, output: TwimlReplyChannel.render(&reply).body },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}

fn classify(error: BootstrapError) -> (&'static str, String, u8) {
    match error {
        BootstrapError::Config(error) => {
            ("config_validation", format!("configuration issue: {error}"), 2)
        }
        BootstrapError::Resolver(error) => ("resolver_setup", error.to_string(), 2),
        BootstrapError::DatabaseConnect(error) => ("db_connectivity", error.to_string(), 4),
        BootstrapError::Migration(error) => ("migration", error.to_string(), 5),
    }
}
