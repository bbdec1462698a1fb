//! SMS channel plumbing for the Twilio Messaging webhook.
//!
//! - **Inbound** (`inbound`) - the form fields Twilio posts for each message
//! - **TwiML** (`twiml`) - `<Response><Message>` envelope builder
//! - **Channel** (`channel`) - `ReplyChannel` port and its TwiML rendering
//!
//! ```text
//! Twilio POST (form) → TwilioInbound → InboundMessage → ConversationService
//!                                                            ↓
//!                     TwiML body ← ReplyChannel ← OutboundMessage
//! ```

pub mod channel;
pub mod inbound;
pub mod twiml;

pub use channel::{RenderedReply, ReplyChannel, TwimlReplyChannel};
pub use inbound::{InboundError, TwilioInbound};
pub use twiml::{escape_xml, MessagingResponse, TWIML_CONTENT_TYPE};
