mod configuration;
mod dimensions;
mod failures;
mod fulltext_merge;
mod rebuild;
