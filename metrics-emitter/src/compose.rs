/// Strategy for folding a metric source into its name.
///
/// When a metric is emitted with a source, the client replaces the bare name with the result of
/// [`compose`][ComposeName::compose] before applying the prefix. Any `Fn(&str, &str) -> String` closure that is
/// `Send + Sync` can be used as a strategy.
pub trait ComposeName: Send + Sync {
    /// Composes the given metric name and source into a single name segment.
    fn compose(&self, name: &str, source: &str) -> String;
}

impl<F> ComposeName for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn compose(&self, name: &str, source: &str) -> String {
        (self)(name, source)
    }
}

/// The default composition strategy, producing `<source>|<name>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SourceThenName;

impl ComposeName for SourceThenName {
    fn compose(&self, name: &str, source: &str) -> String {
        let mut composed = String::with_capacity(source.len() + 1 + name.len());
        composed.push_str(source);
        composed.push('|');
        composed.push_str(name);
        composed
    }
}
