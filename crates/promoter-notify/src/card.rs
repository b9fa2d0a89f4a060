//! Interactive card payload for chat-bot webhooks.

use serde::Serialize;

use promoter_core::Severity;

/// Top-level webhook body.
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub msg_type: &'static str,
    pub card: CardBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardBody {
    pub config: CardConfig,
    pub header: CardHeader,
    pub elements: Vec<CardElement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardConfig {
    pub wide_screen_mode: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardHeader {
    pub title: Text,
    pub template: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardElement {
    pub tag: &'static str,
    pub fields: Vec<CardField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardField {
    pub is_short: bool,
    pub text: Text,
}

#[derive(Debug, Clone, Serialize)]
pub struct Text {
    pub content: String,
    pub tag: &'static str,
}

impl Text {
    fn plain(content: &str) -> Self {
        Self {
            content: content.to_string(),
            tag: "plain_text",
        }
    }

    fn markdown(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tag: "lark_md",
        }
    }
}

/// Header colour for a severity.
pub fn template_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "green",
        Severity::Warn => "orange",
        Severity::Error => "red",
    }
}

/// Render `message` as a card: a label/value pair for the time and one
/// for the detail.
pub fn render_card(title: &str, message: &str, severity: Severity, timestamp: &str) -> Card {
    let pair = |label: &str, value: String| {
        [
            CardField {
                is_short: true,
                text: Text::markdown(format!("**{label}**")),
            },
            CardField {
                is_short: false,
                text: Text::markdown(value),
            },
        ]
    };

    let mut fields = Vec::with_capacity(4);
    fields.extend(pair("Time", timestamp.to_string()));
    fields.extend(pair("Detail", format!("{message}\n")));

    Card {
        msg_type: "interactive",
        card: CardBody {
            config: CardConfig {
                wide_screen_mode: true,
            },
            header: CardHeader {
                title: Text::plain(title),
                template: template_for(severity),
            },
            elements: vec![CardElement { tag: "div", fields }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_shape() {
        let card = render_card("Release notice", "svcA updated", Severity::Error, "2024-05-01 10:00:00");
        let json = serde_json::to_value(&card).unwrap();

        assert_eq!(json["msg_type"], "interactive");
        assert_eq!(json["card"]["config"]["wide_screen_mode"], true);
        assert_eq!(json["card"]["header"]["title"]["content"], "Release notice");
        assert_eq!(json["card"]["header"]["title"]["tag"], "plain_text");
        assert_eq!(json["card"]["header"]["template"], "red");

        let fields = json["card"]["elements"][0]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[1]["text"]["content"], "2024-05-01 10:00:00");
        assert_eq!(fields[3]["text"]["content"], "svcA updated\n");
        assert_eq!(fields[3]["text"]["tag"], "lark_md");
    }

    #[test]
    fn severity_colours() {
        assert_eq!(template_for(Severity::Info), "green");
        assert_eq!(template_for(Severity::Warn), "orange");
    }
}
