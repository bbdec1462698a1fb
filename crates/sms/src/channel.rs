use vaxline_core::domain::message::OutboundMessage;

use crate::twiml::{MessagingResponse, TWIML_CONTENT_TYPE};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedReply {
    pub content_type: &'static str,
    pub body: String,
}

/// Turns the single reply for an inbound message into the channel's wire body.
pub trait ReplyChannel: Send + Sync {
    fn render(&self, reply: &OutboundMessage) -> RenderedReply;
}

/// Synchronous reply in the webhook response body, as Twilio expects.
#[derive(Clone, Copy, Debug, Default)]
pub struct TwimlReplyChannel;

impl ReplyChannel for TwimlReplyChannel {
    fn render(&self, reply: &OutboundMessage) -> RenderedReply {
        RenderedReply {
            content_type: TWIML_CONTENT_TYPE,
            body: MessagingResponse::new().message(reply.text.as_str()).to_xml(),
        }
    }
}
