//! Mention parsing and the user-facing texts of the bot.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{MemberId, Pair};

static MENTION_RE: OnceLock<Regex> = OnceLock::new();

fn mention_re() -> &'static Regex {
    // Slack escapes mentions in slash-command text as `<@U123|name>`; plain
    // `<@U123>` shows up when the command is typed without escaping.
    MENTION_RE.get_or_init(|| Regex::new(r"<@([^|>\s]+)(?:\|[^>]*)?>").expect("valid regex"))
}

/// Every member mentioned in `text`, left to right.
pub fn extract_mentions(text: &str) -> Vec<MemberId> {
    mention_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|id| MemberId::new(id.as_str()))
        .collect()
}

/// Exactly two mentions, in typing order, or `None`.
pub fn extract_two_mentions(text: &str) -> Option<(MemberId, MemberId)> {
    let mut mentions = extract_mentions(text).into_iter();
    match (mentions.next(), mentions.next(), mentions.next()) {
        (Some(user1), Some(user2), None) => Some((user1, user2)),
        _ => None,
    }
}

/// Slack mention markup for a member.
pub fn mention(member: &MemberId) -> String {
    format!("<@{member}>")
}

// ============== Notices ==============

pub const NO_TWIN: &str = "Désolé tu n'as pas de Twin Lunch :crying_cat_face:";
pub const NOT_AUTHORIZED: &str =
    "Désolé mais tu n'as pas les droits pour administrer les Twin Lunch :no_entry_sign:";
pub const ADD_NEEDS_TWO: &str = "Tu dois donner deux personnes pour créer un Twin Lunch";
pub const ADD_NEEDS_DIFFERENT: &str =
    "Tu dois donner deux personnes différentes pour créer un Twin Lunch";
pub const REMOVE_NEEDS_TWO: &str = "Tu dois donner deux personnes pour supprimer un Twin Lunch";
pub const NO_PAIRS: &str = "Il n'y a aucun Twin Lunch";
pub const CLEARED: &str = "J'ai supprimé tous les Twin Lunch :fire:";
pub const ONBOARDING: &str = "Salut ! Ton Twin Lunch a été choisi, tu peux discuter avec lui ou elle dans cette conversation sans révéler ton identité :sunglasses:";
pub const SOMETHING_WENT_WRONG: &str =
    "Oups, quelque chose s'est mal passé, réessaie plus tard :warning:";

pub fn already_paired(member: &MemberId) -> String {
    format!("{} a déjà un Twin Lunch", mention(member))
}

pub fn paired(user1: &MemberId, user2: &MemberId) -> String {
    format!(
        "J'ai mis en relation {} et {} pour leur Twin Lunch",
        mention(user1),
        mention(user2)
    )
}

pub fn not_paired(user1: &MemberId, user2: &MemberId) -> String {
    format!(
        "{} et {} ne sont pas en Twin Lunch ensemble",
        mention(user1),
        mention(user2)
    )
}

pub fn removed(user1: &MemberId, user2: &MemberId) -> String {
    format!(
        "J'ai supprimé le Twin Lunch entre {} et {}",
        mention(user1),
        mention(user2)
    )
}

pub fn pair_list(pairs: &[Pair]) -> String {
    let lines = pairs
        .iter()
        .map(|p| format!("• {} et {}", mention(&p.user1), mention(&p.user2)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Voilà la liste des Twin Lunch :\n\n{lines}")
}

pub fn unknown_command(name: &str, known: &[&str]) -> String {
    format!(
        "Je ne connais pas la commande `{name}`. Commandes disponibles : {}",
        known.join(", ")
    )
}
