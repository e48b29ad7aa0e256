//! Reading and patching the entity text lump
//!

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::bytes::Regex;
use tracing::{info, instrument, warn};

use crate::error::{EntityError, Error, Result};
use crate::lzma;

/// Entity lump data after it has been encoded for the lump directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEntities {
    /// Bytes to store in the lump
    pub data: Vec<u8>,

    /// Value for the lump's uncompressed length, `0` when stored as plain text
    pub uncompressed_length: u32,
}

/// The entity text of a map
///
/// The text is a sequence of `{ "key" "value" ... }` blocks. It may be stored as plain text or
/// wrapped in an LZMA frame, which is remembered so [`EntityLump::encode`] writes it back the same
/// way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLump {
    text: Vec<u8>,
    properties: Option<[u8; 5]>,
}

impl EntityLump {
    /// Read the entity lump data, decompressing it when it is framed
    #[instrument(skip_all, fields(size = data.len()), err)]
    pub fn decode(data: &[u8]) -> Result<EntityLump> {
        if lzma::is_framed(data) {
            let (text, properties) = lzma::decode(data)?;
            return Ok(EntityLump {
                text,
                properties: Some(properties),
            });
        }

        Ok(EntityLump {
            text: data.to_vec(),
            properties: None,
        })
    }

    /// Wrap plain entity text
    pub fn from_text(text: impl Into<Vec<u8>>) -> EntityLump {
        EntityLump {
            text: text.into(),
            properties: None,
        }
    }

    /// The raw entity text
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Whether the lump was stored in an LZMA frame
    pub fn is_framed(&self) -> bool {
        self.properties.is_some()
    }

    /// Number of entity blocks in the text
    pub fn entity_count(&self) -> usize {
        tokens(&self.text)
            .filter(|t| matches!(t, Token::Open))
            .count()
    }

    /// Number of entities of every class name
    pub fn classnames(&self) -> BTreeMap<String, usize> {
        let mut classes = BTreeMap::new();
        for pair in self.pairs_of("classname") {
            *classes
                .entry(String::from_utf8_lossy(&self.text[pair.value]).into_owned())
                .or_insert(0) += 1;
        }
        classes
    }

    /// First value stored for `key`
    pub fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        self.pairs_of(key)
            .next()
            .map(|pair| String::from_utf8_lossy(&self.text[pair.value]))
    }

    /// Replace the first value stored for `key`, returning the previous value
    ///
    /// Only the value of that one key/value pair is rewritten, text elsewhere that happens to
    /// contain the same characters stays untouched.
    #[instrument(skip(self), err)]
    pub fn replace_value(&mut self, key: &str, value: &str) -> Result<String> {
        if value.contains('"') || value.contains('\n') {
            return Err(EntityError::InvalidValue(value.to_owned()).into());
        }

        let mut matches = self.pairs_of(key);
        let span = matches
            .next()
            .map(|pair| pair.value)
            .ok_or_else(|| EntityError::KeyNotFound(key.to_owned()))?;

        let others = matches.count();
        if others > 0 {
            warn!("{key} is set {} more times, only the first one is replaced", others);
        }

        let previous = String::from_utf8_lossy(&self.text[span.clone()]).into_owned();
        self.text.splice(span, value.bytes());
        info!("replaced {key} {previous:?} with {value:?}");

        Ok(previous)
    }

    /// Encode the text for storage in the lump, framing it again if it was framed
    pub fn encode(&self) -> Result<EncodedEntities> {
        match self.properties {
            Some(properties) => Ok(EncodedEntities {
                data: lzma::encode(&self.text, Some(properties))?,
                uncompressed_length: u32::try_from(self.text.len())
                    .map_err(|_| Error::Codec("entity text exceeds 4 GiB".into()))?,
            }),
            None => Ok(EncodedEntities {
                data: self.text.clone(),
                uncompressed_length: 0,
            }),
        }
    }

    /// Key/value pairs inside entity blocks whose key is exactly `key`
    fn pairs_of<'a>(&'a self, key: &'a str) -> impl Iterator<Item = KeyValue> + 'a {
        key_values(&self.text)
            .filter(move |pair| &self.text[pair.key.clone()] == key.as_bytes())
    }
}

/// Quoted strings and the braces outside of them
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?-u)\{|\}|"([^"]*)""#).expect("token pattern is valid"));

enum Token {
    Open,
    Close,
    Quoted(Range<usize>),
}

/// Byte ranges of the key and of the value, quotes excluded
struct KeyValue {
    key: Range<usize>,
    value: Range<usize>,
}

fn tokens(text: &[u8]) -> impl Iterator<Item = Token> + '_ {
    TOKEN
        .captures_iter(text)
        .map(|c| match (c.get(1), c.get(0).map(|m| m.as_bytes())) {
            (Some(quoted), _) => Token::Quoted(quoted.range()),
            (None, Some(b"{")) => Token::Open,
            _ => Token::Close,
        })
}

/// Quoted strings inside a block, paired up in order as key then value
fn key_values(text: &[u8]) -> impl Iterator<Item = KeyValue> + '_ {
    let mut depth = 0usize;
    let mut key = None;
    tokens(text).filter_map(move |token| {
        match token {
            Token::Open => {
                depth += 1;
                key = None;
            }
            Token::Close => {
                depth = depth.saturating_sub(1);
                key = None;
            }
            Token::Quoted(range) if depth > 0 => match key.take() {
                None => key = Some(range),
                Some(name) => return Some(KeyValue { key: name, value: range }),
            },
            Token::Quoted(_) => {}
        }
        None
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::entities::EntityLump;
    use crate::error::{EntityError, Error, Result};
    use crate::lzma;

    const TEXT: &str = "{\n\"skyname\" \"sky_day01_01\"\n\"classname\" \"worldspawn\"\n}\n{\n\"targetname\" \"sky_day01_01_relay\"\n\"classname\" \"logic_relay\"\n}\n{\n\"classname\" \"logic_relay\"\n}\n\0";

    #[test]
    fn read_plain_text() -> Result<()> {
        let lump = EntityLump::decode(TEXT.as_bytes())?;
        assert!(!lump.is_framed());
        assert_eq!(lump.entity_count(), 3);
        assert_eq!(lump.value("skyname").as_deref(), Some("sky_day01_01"));
        assert_eq!(lump.value("missing"), None);

        let classes = lump.classnames();
        assert_eq!(classes.get("worldspawn"), Some(&1));
        assert_eq!(classes.get("logic_relay"), Some(&2));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn replace_only_the_value_span() -> Result<()> {
        let mut lump = EntityLump::from_text(TEXT);
        let previous = lump.replace_value("skyname", "sky_jungle_01")?;
        assert_eq!(previous, "sky_day01_01");

        let expected = TEXT.replacen("\"sky_day01_01\"", "\"sky_jungle_01\"", 1);
        assert_eq!(String::from_utf8_lossy(lump.text()), expected);
        assert!(String::from_utf8_lossy(lump.text()).contains("sky_day01_01_relay"));

        let encoded = lump.encode()?;
        assert_eq!(encoded.uncompressed_length, 0);
        assert_eq!(encoded.data, expected.as_bytes());

        Ok(())
    }

    #[test]
    fn value_equal_to_a_key_name() -> Result<()> {
        let text = "{\n\"message\" \"skyname\"\n\"skyname\" \"sky_a\"\n}\n";
        let mut lump = EntityLump::from_text(text);
        assert_eq!(lump.value("skyname").as_deref(), Some("sky_a"));
        assert_eq!(lump.value("message").as_deref(), Some("skyname"));

        assert_eq!(lump.replace_value("skyname", "sky_b")?, "sky_a");
        assert_eq!(
            String::from_utf8_lossy(lump.text()),
            "{\n\"message\" \"skyname\"\n\"skyname\" \"sky_b\"\n}\n"
        );

        Ok(())
    }

    #[test]
    fn braces_inside_values() {
        let text = "{\n\"classname\" \"point_servercommand\"\n\"message\" \"say {hello}\"\n}\n{\n\"classname\" \"info_target\"\n}\n";
        let lump = EntityLump::from_text(text);
        assert_eq!(lump.entity_count(), 2);
        assert_eq!(lump.value("message").as_deref(), Some("say {hello}"));
        assert_eq!(lump.classnames().len(), 2);
    }

    #[test]
    fn long_keys_are_only_looked_up() {
        let key = "k".repeat(1 << 20);
        let mut lump = EntityLump::from_text(TEXT);
        assert_eq!(lump.value(&key), None);
        assert!(matches!(
            lump.replace_value(&key, "x"),
            Err(Error::Entity(EntityError::KeyNotFound(_)))
        ));
    }

    #[test]
    fn replace_missing_key() {
        let mut lump = EntityLump::from_text(TEXT);
        assert!(matches!(
            lump.replace_value("detailmaterial", "x"),
            Err(Error::Entity(EntityError::KeyNotFound(_)))
        ));
    }

    #[test]
    fn replace_with_invalid_value() {
        let mut lump = EntityLump::from_text(TEXT);
        assert!(matches!(
            lump.replace_value("skyname", "sky\" \"x"),
            Err(Error::Entity(EntityError::InvalidValue(_)))
        ));
    }

    #[test]
    fn framed_text_stays_framed() -> Result<()> {
        let framed = lzma::encode(TEXT.as_bytes(), None)?;

        let mut lump = EntityLump::decode(&framed)?;
        assert!(lump.is_framed());
        assert_eq!(lump.text(), TEXT.as_bytes());

        lump.replace_value("skyname", "sky_night")?;
        let encoded = lump.encode()?;
        assert!(lzma::is_framed(&encoded.data));
        assert_eq!(encoded.uncompressed_length as usize, lump.text().len());

        let (decoded, _) = lzma::decode(&encoded.data)?;
        assert_eq!(decoded, lump.text());

        Ok(())
    }
}
