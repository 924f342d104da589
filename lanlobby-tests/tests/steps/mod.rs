mod chat_steps;
mod membership_steps;
mod roster_steps;
