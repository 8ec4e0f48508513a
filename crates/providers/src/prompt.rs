//! System prompt for the routing classifier.

use std::fmt::Write;

use switchyard_core::{ClassifierRequest, TenantConfig};

/// Turns of history shown to the classifier.
pub const HISTORY_TURNS: usize = 5;

const DEFAULT_BOT_NAME: &str = "Assistant";
const DEFAULT_GOAL: &str = "help customers";
const DEFAULT_PERSONALITY: &str = "friendly and professional";
const DEFAULT_GREETING: &str = "Hello! How can I help you?";
const DEFAULT_FAREWELL: &str = "Thanks for reaching out!";
const DEFAULT_UNKNOWN: &str = "I don't have that information; let me transfer you to an agent.";
const DEFAULT_ESCALATION: &str = "I'll connect you with an agent who can help you better.";

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => default,
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let v = value.trim();
    (!v.is_empty()).then_some(v)
}

/// Build the system prompt for one classification.
///
/// Missing phrasing fields fall back to neutral defaults. Only the newest
/// [`HISTORY_TURNS`] turns of `request.history` are included.
pub fn build_system_prompt(request: &ClassifierRequest) -> String {
    let tenant = &request.tenant;
    let capability = tenant.derived_capability();
    let mut p = String::with_capacity(2048);

    let _ = writeln!(
        p,
        "You are {}, {}.",
        or_default(non_empty(&tenant.bot_name), DEFAULT_BOT_NAME),
        or_default(non_empty(&tenant.role), "a virtual assistant"),
    );
    if let Some(kind) = non_empty(&tenant.bot_type) {
        let _ = writeln!(p, "Business type: {kind}.");
    }
    let _ = writeln!(
        p,
        "Primary goal: {}.",
        or_default(non_empty(&tenant.primary_goal), DEFAULT_GOAL)
    );
    let _ = writeln!(
        p,
        "Personality: {}.",
        or_default(tenant.personality.as_deref(), DEFAULT_PERSONALITY)
    );
    if let Some(tone) = tenant.tone.as_deref().and_then(non_empty) {
        let _ = writeln!(p, "Tone: {tone}.");
    }
    if let Some(date) = tenant.current_date.as_deref().and_then(non_empty) {
        let _ = writeln!(p, "Today's date: {date}.");
    }

    p.push_str("\n## Phrases\n");
    write_phrases(&mut p, tenant);

    p.push_str("\n## Routing\n");
    let _ = writeln!(
        p,
        "This business works with the \"{capability}\" specialist. Delegate to it whenever \
         the customer wants to act on {capability} (check availability, book, buy, change or \
         cancel). Answer directly for greetings, farewells, and simple questions you can answer \
         from the business information below."
    );
    p.push_str(
        "Reply with a JSON object: \"action\" is \"delegate\" or \"respond\"; \"capability\" is \
         the specialist when delegating, otherwise null; \"response\" is your message to the \
         customer (a short transition line when delegating).\n",
    );

    if let Some(context) = request.business_context.as_deref().and_then(non_empty) {
        p.push_str("\n## Business information\n");
        p.push_str(context);
        p.push('\n');
    }

    if !request.history.is_empty() {
        p.push_str("\n## Conversation so far\n");
        let skip = request.history.len().saturating_sub(HISTORY_TURNS);
        for turn in request.history.iter().skip(skip) {
            let routed = match turn.delegated_capability {
                Some(c) => format!(" (delegated to: {c})"),
                None => " (answered directly)".to_string(),
            };
            let _ = writeln!(p, "- Customer: \"{}\"", turn.user_message);
            let _ = writeln!(p, "  You replied: \"{}\"{routed}", turn.response);
        }
        if let Some(active) = request.active_capability {
            let _ = writeln!(
                p,
                "The customer is currently working with the \"{active}\" specialist; keep \
                 delegating to it while the conversation stays on that topic."
            );
        }
    }

    p
}

fn write_phrases(p: &mut String, tenant: &TenantConfig) {
    let _ = writeln!(
        p,
        "- Greeting: \"{}\"",
        or_default(tenant.greeting.as_deref(), DEFAULT_GREETING)
    );
    let _ = writeln!(
        p,
        "- Farewell: \"{}\"",
        or_default(tenant.farewell_phrase.as_deref(), DEFAULT_FAREWELL)
    );
    let _ = writeln!(
        p,
        "- When you don't know: \"{}\"",
        or_default(tenant.unknown_answer_phrase.as_deref(), DEFAULT_UNKNOWN)
    );
    let _ = writeln!(
        p,
        "- Escalation: \"{}\"",
        or_default(tenant.escalation_phrase.as_deref(), DEFAULT_ESCALATION)
    );
    if let Some(topics) = tenant.escalation_topics.as_deref().and_then(non_empty) {
        let _ = writeln!(p, "- Escalate when the customer raises: {topics}");
    }
}
