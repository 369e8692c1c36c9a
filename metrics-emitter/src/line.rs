use crate::kind::MetricKind;

const NAME_SEPARATOR: char = '.';

/// A metric value, prior to being rendered as text.
#[derive(Clone, Copy, Debug)]
pub(crate) enum MetricValue<'a> {
    Integer(u64),
    Text(&'a str),
}

impl<'a> MetricValue<'a> {
    /// Converts a signed value into a metric value.
    ///
    /// Returns `None` if the value is negative, as none of the metric kinds are defined for negative magnitudes.
    pub fn non_negative(value: i64) -> Option<Self> {
        u64::try_from(value).ok().map(MetricValue::Integer)
    }
}

/// Renders metric values to text without intermediate allocations.
pub(crate) struct ValueFormatter {
    int_writer: itoa::Buffer,
}

impl ValueFormatter {
    pub fn new() -> Self {
        Self { int_writer: itoa::Buffer::new() }
    }

    pub fn format<'a>(&'a mut self, value: MetricValue<'a>) -> &'a str {
        match value {
            MetricValue::Integer(v) => self.int_writer.format(v),
            MetricValue::Text(v) => v,
        }
    }
}

/// Normalizes a prefix by stripping exactly one trailing separator, if present.
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    prefix.strip_suffix(NAME_SEPARATOR).unwrap_or(prefix).to_string()
}

/// Builds a single metric line in the form of `[<prefix>.]<name>:<value>|<type>[|<postfix>]`.
///
/// `name` is expected to already have any source composed into it.
pub(crate) fn build_line(prefix: &str, name: &str, value: &str, kind: MetricKind, postfix: Option<&str>) -> String {
    let type_tag = kind.type_tag();
    let postfix_len = postfix.map_or(0, |p| p.len() + 1);
    let mut line =
        String::with_capacity(prefix.len() + 1 + name.len() + 1 + value.len() + 1 + type_tag.len() + postfix_len);

    if !prefix.is_empty() {
        line.push_str(prefix);
        line.push(NAME_SEPARATOR);
    }
    line.push_str(name);
    line.push(':');
    line.push_str(value);
    line.push('|');
    line.push_str(type_tag);

    if let Some(postfix) = postfix {
        line.push('|');
        line.push_str(postfix);
    }

    line
}
