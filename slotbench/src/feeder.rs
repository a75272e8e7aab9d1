/// Index of a latency group, as reported by [`DataFeeder::groups`].
pub type GroupId = usize;

/// Source of inputs for the full pipeline (and optionally sync) runs.
///
/// For each dispatch the harness reads [`next_batch_size`](DataFeeder::next_batch_size)
/// and [`current_group`](DataFeeder::current_group), which both describe the input the
/// following [`next_input`](DataFeeder::next_input) call returns, then takes the input.
pub trait DataFeeder
where
    Self: Send,
{
    type Input: Send + 'static;

    /// Names of the known latency groups. A group's [`GroupId`] is its index here.
    fn groups(&self) -> &[String];

    /// Frames in the upcoming input.
    fn next_batch_size(&self) -> usize;

    /// Group of the upcoming input.
    fn current_group(&self) -> GroupId;

    /// Take the upcoming input and advance.
    fn next_input(&mut self) -> Self::Input;
}

#[cfg(feature = "builtins")]
pub use builtins::*;

#[cfg(feature = "builtins")]
mod builtins {
    use super::*;
    use crate::error::{BenchError, Result};

    #[derive(Clone, Debug)]
    pub struct FeedEntry<I> {
        pub group: GroupId,
        pub batch_size: usize,
        pub input: I,
    }

    impl<I> FeedEntry<I> {
        pub fn new(group: GroupId, batch_size: usize, input: I) -> Self {
            Self {
                group,
                batch_size,
                input,
            }
        }
    }

    /// Feeder cycling endlessly over a fixed list of prepared inputs.
    #[derive(Clone, Debug)]
    pub struct CyclicFeeder<I> {
        groups: Vec<String>,
        entries: Vec<FeedEntry<I>>,
        cursor: usize,
    }

    impl<I: Clone + Send + 'static> CyclicFeeder<I> {
        pub fn new(groups: Vec<String>, entries: Vec<FeedEntry<I>>) -> Result<Self> {
            if entries.is_empty() {
                return Err(BenchError::Config("feeder has no inputs".into()));
            }
            if let Some(bad) = entries.iter().find(|e| e.group >= groups.len()) {
                return Err(BenchError::Config(format!(
                    "input tagged with unknown group {} ({} groups)",
                    bad.group,
                    groups.len()
                )));
            }
            Ok(Self {
                groups,
                entries,
                cursor: 0,
            })
        }

        /// One group per input, named after its position.
        pub fn from_inputs(inputs: Vec<(usize, I)>) -> Result<Self> {
            let groups = (0..inputs.len()).map(|i| format!("input{i}")).collect();
            let entries = inputs
                .into_iter()
                .enumerate()
                .map(|(group, (batch_size, input))| FeedEntry::new(group, batch_size, input))
                .collect();
            Self::new(groups, entries)
        }

        fn current(&self) -> &FeedEntry<I> {
            &self.entries[self.cursor]
        }
    }

    impl<I: Clone + Send + 'static> DataFeeder for CyclicFeeder<I> {
        type Input = I;

        fn groups(&self) -> &[String] {
            &self.groups
        }

        fn next_batch_size(&self) -> usize {
            self.current().batch_size
        }

        fn current_group(&self) -> GroupId {
            self.current().group
        }

        fn next_input(&mut self) -> I {
            let input = self.current().input.clone();
            self.cursor = (self.cursor + 1) % self.entries.len();
            input
        }
    }

}
