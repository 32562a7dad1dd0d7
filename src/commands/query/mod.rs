mod fusion;
mod output;
mod ranking;
mod retrieval;
mod run;
mod semantic_retrieval;
#[cfg(test)]
mod tests;
mod text;

pub(crate) use run::run;
