use std::collections::HashMap;

use crate::error::NfbError;

/// Ordered channel labels for a recording, with a name -> index lookup.
/// Analogous to the channel-label handling scattered through acquisition
/// setup in this lineage, collected here into one small type.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(into = "Vec<String>")]
pub struct ChannelSet {
    labels: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl From<Vec<String>> for ChannelSet {
    fn from(labels: Vec<String>) -> Self {
        ChannelSet::new(labels)
    }
}

impl From<ChannelSet> for Vec<String> {
    fn from(cs: ChannelSet) -> Self {
        cs.labels
    }
}

impl<'de> serde::Deserialize<'de> for ChannelSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let labels = Vec::<String>::deserialize(deserializer)?;
        Ok(ChannelSet::new(labels))
    }
}

impl ChannelSet {
    pub fn new(labels: Vec<String>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self { labels, index }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn index_of(&self, name: &str) -> Result<usize, NfbError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| NfbError::UnknownChannel(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_by_label() {
        let cs = ChannelSet::new(vec!["Cz".into(), "Pz".into()]);
        assert_eq!(cs.index_of("Pz").unwrap(), 1);
        assert!(cs.index_of("Oz").is_err());
    }

    #[test]
    fn round_trips_through_json_as_a_plain_label_array() {
        let cs = ChannelSet::new(vec!["Cz".into(), "Pz".into()]);
        let json = serde_json::to_string(&cs).unwrap();
        assert_eq!(json, r#"["Cz","Pz"]"#);
        let parsed: ChannelSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.index_of("Cz").unwrap(), 0);
    }
}
