//! Text shown to entities and command senders.
//!
//! `\u{a7}c` is red, `\u{a7}a` is green.

pub const USAGE: &str = "\u{a7}cUsage: /join <code> | reload | resetattempts | reloadverified";
pub const VERIFY_USAGE: &str = "\u{a7}cUsage: /join <code>";
pub const CONSOLE_USAGE: &str = "\u{a7}cConsole can use: /join reload | resetattempts | reloadverified";
pub const NO_PERMISSION: &str = "\u{a7}cYou do not have permission.";

pub const VERIFIED: &str = "\u{a7}aYou have been verified! Welcome.";
pub const ALREADY_VERIFIED: &str = "\u{a7}aYou are already verified.";
pub const CHAT_DENIED: &str = "\u{a7}cYou cannot chat until you verify with /join <code>.";

pub const CONFIG_RELOADED: &str = "\u{a7}a[InviteGate] Config reloaded successfully!";
pub const VERIFIED_RELOADED: &str =
    "\u{a7}a[InviteGate] Verified players and attempts reloaded from file.";

#[must_use]
pub fn verify_prompt(time_limit_secs: u64) -> String {
    format!("\u{a7}cYou must verify using /join <code> within {time_limit_secs} seconds.")
}

#[must_use]
pub fn invalid_code(attempts: u32, max_attempts: u32) -> String {
    format!("\u{a7}cInvalid invite code! Attempts: {attempts}/{max_attempts}")
}

#[must_use]
pub fn attempts_reset(cleared: usize) -> String {
    format!("\u{a7}a[InviteGate] All failed attempts have been reset ({cleared} cleared).")
}

#[must_use]
pub fn reload_failed(what: &str, err: &dyn std::error::Error) -> String {
    format!("\u{a7}c[InviteGate] Failed to reload {what}; keeping current state: {err}")
}
