mod detect;
mod emit;
mod fetch;
mod hierarchy;
mod run;

#[cfg(test)]
mod tests;

pub use run::run;
