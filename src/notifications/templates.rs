//! Message bodies per notification kind, rendered with Tera. Output is
//! Telegram-flavoured HTML; values are HTML-escaped on insertion.

use tera::{Context, Tera};

use super::models::NotificationContext;
use crate::monitoring::models::NotificationKind;

const HEADING: &str =
    "{% if title %}<b>{{ title }}</b>{% else %}<b>Your listing</b>{% endif %}";

const SOLD_TEMPLATE: &str = r#"🎉 <b>Listing sold</b>

{{ heading | safe }} is no longer available on the platform, which means it was most likely sold.

📅 Consigned on: {{ consignment_date }}
💰 Payment deadline: {{ deadline_date }} ({{ days_remaining }} days left)
🔗 {{ url }}"#;

const DEADLINE_WARNING_TEMPLATE: &str = r#"⏰ <b>Payment deadline approaching</b>

{{ heading | safe }} reaches the end of its {{ deadline_days }}-day window on {{ deadline_date }}.
Only {{ days_remaining }} days remain.

🔗 {{ url }}"#;

const EXPIRED_TEMPLATE: &str = r#"⌛ <b>Deadline reached</b>

The {{ deadline_days }}-day window for {{ heading | safe }} ended on {{ deadline_date }}.
Monitoring for this listing has stopped.

🔗 {{ url }}"#;

const WEEKLY_DIGEST_TEMPLATE: &str = r#"📊 <b>Weekly summary</b>

{% if status == "Sold" %}{{ heading | safe }} was sold and is awaiting payment.{% else %}{{ heading | safe }} is still listed.{% endif %}
Day {{ days_elapsed }} of {{ deadline_days }} ({{ percent_elapsed }}%), {{ days_remaining }} days until {{ deadline_date }}.

🔗 {{ url }}"#;

fn template_for(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Sold => SOLD_TEMPLATE,
        NotificationKind::DeadlineWarning => DEADLINE_WARNING_TEMPLATE,
        NotificationKind::Expired => EXPIRED_TEMPLATE,
        NotificationKind::WeeklyDigest => WEEKLY_DIGEST_TEMPLATE,
    }
}

pub fn render_message(
    kind: NotificationKind,
    context: &NotificationContext,
) -> Result<String, tera::Error> {
    let mut tera_context = Context::from_serialize(context)?;
    let heading = Tera::one_off(HEADING, &tera_context, true)?;
    tera_context.insert("heading", &heading);

    Tera::one_off(template_for(kind), &tera_context, true)
}
