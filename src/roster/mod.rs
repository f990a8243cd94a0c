pub mod aliases;
pub mod feed;
pub mod resolver;

pub use feed::{FileRosterFeed, RosterFeed, StatsRosterFeed};
pub use resolver::PlayerResolver;
