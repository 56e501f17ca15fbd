// Item directory - display names of the project's Items

use crate::codec::{FormatError, TextCodec, finish_file, join_fields, parse_field, records};
use crate::error::{ProjectError, ProjectResult, ReferenceKind};
use crate::sequencer::ItemUid;
use std::collections::BTreeMap;

fn check_name(name: &str) -> ProjectResult<()> {
    if name.trim().is_empty() || name.contains(['\n', '\r']) {
        return Err(ProjectError::InvalidValue(format!(
            "invalid item name '{}'",
            name
        )));
    }
    Ok(())
}

/// Maps item uids to unique names (`items.txt`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDirectory {
    names: BTreeMap<ItemUid, String>,
}

impl ItemDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, uid: ItemUid) -> bool {
        self.names.contains_key(&uid)
    }

    pub fn name_of(&self, uid: ItemUid) -> Option<&str> {
        self.names.get(&uid).map(String::as_str)
    }

    pub fn uid_of(&self, name: &str) -> Option<ItemUid> {
        self.names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(uid, _)| *uid)
    }

    pub fn uids(&self) -> impl Iterator<Item = ItemUid> + '_ {
        self.names.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemUid, &str)> {
        self.names.iter().map(|(uid, n)| (*uid, n.as_str()))
    }

    /// Smallest uid not in use
    pub fn next_uid(&self) -> ItemUid {
        (0..)
            .find(|uid| !self.names.contains_key(uid))
            .unwrap_or(ItemUid::MAX)
    }

    /// `base`, or `base-N` for the first N that is free
    pub fn unique_name(&self, base: &str) -> String {
        if self.uid_of(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| self.uid_of(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// Register a new Item under a unique version of `name`
    pub fn add(&mut self, name: &str) -> ProjectResult<ItemUid> {
        check_name(name)?;
        let uid = self.next_uid();
        let name = self.unique_name(name);
        log::debug!("Item {} named '{}'", uid, name);
        self.names.insert(uid, name);
        Ok(uid)
    }

    /// Rename an Item; the name must not be taken by another Item
    pub fn rename(&mut self, uid: ItemUid, name: &str) -> ProjectResult<()> {
        check_name(name)?;
        if !self.contains(uid) {
            return Err(ProjectError::reference(ReferenceKind::Item, uid));
        }
        if self.uid_of(name).is_some_and(|other| other != uid) {
            return Err(ProjectError::InvalidValue(format!(
                "item name '{}' already in use",
                name
            )));
        }
        self.names.insert(uid, name.to_string());
        Ok(())
    }

    pub fn remove(&mut self, uid: ItemUid) -> Option<String> {
        self.names.remove(&uid)
    }

    /// Drop entries whose uid fails `keep`, logging each one
    pub fn retain_uids<F: FnMut(ItemUid) -> bool>(&mut self, mut keep: F) {
        self.names.retain(|uid, name| {
            let kept = keep(*uid);
            if !kept {
                log::warn!("Dropping item {} ('{}') from the directory", uid, name);
            }
            kept
        });
    }
}

impl TextCodec for ItemDirectory {
    fn encode(&self) -> String {
        finish_file(
            self.names
                .iter()
                .map(|(uid, name)| join_fields([uid.to_string(), name.clone()]))
                .collect(),
        )
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let mut directory = ItemDirectory::new();
        for (line_no, line) in records(text)? {
            let Some((uid, name)) = line.split_once('|') else {
                return Err(FormatError::new(line_no, "malformed item directory record"));
            };
            let uid: ItemUid = parse_field(line_no, "uid", uid)?;
            if name.is_empty() {
                return Err(FormatError::new(line_no, "empty item name"));
            }
            if directory.contains(uid) {
                return Err(FormatError::new(line_no, format!("duplicate item uid {}", uid)));
            }
            if directory.uid_of(name).is_some() {
                return Err(FormatError::new(
                    line_no,
                    format!("duplicate item name '{}'", name),
                ));
            }
            directory.names.insert(uid, name.to_string());
        }
        Ok(directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_makes_names_unique() {
        let mut directory = ItemDirectory::new();
        let a = directory.add("verse").unwrap();
        let b = directory.add("verse").unwrap();
        let c = directory.add("verse").unwrap();

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(directory.name_of(b), Some("verse-2"));
        assert_eq!(directory.name_of(c), Some("verse-3"));
    }

    #[test]
    fn test_next_uid_reuses_gaps() {
        let mut directory = ItemDirectory::new();
        directory.add("a").unwrap();
        directory.add("b").unwrap();
        directory.remove(0);
        assert_eq!(directory.next_uid(), 0);
    }

    #[test]
    fn test_rename_rejects_taken_name() {
        let mut directory = ItemDirectory::new();
        let a = directory.add("intro").unwrap();
        directory.add("chorus").unwrap();

        assert!(directory.rename(a, "chorus").is_err());
        assert!(directory.rename(a, "intro").is_ok());
        assert!(matches!(
            directory.rename(42, "outro"),
            Err(ProjectError::Reference { uid: 42, .. })
        ));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut directory = ItemDirectory::new();
        assert!(directory.add("").is_err());
        assert!(directory.add("two\nlines").is_err());
    }

    #[test]
    fn test_directory_round_trip() {
        let mut directory = ItemDirectory::new();
        directory.add("bass | take 2").unwrap();
        directory.add("drums").unwrap();

        let text = directory.encode();
        assert_eq!(text, "0|bass | take 2\n1|drums\n\\\n");
        assert_eq!(ItemDirectory::decode(&text).unwrap(), directory);
    }

    #[test]
    fn test_decode_rejects_duplicate_name() {
        let err = ItemDirectory::decode("0|a\n1|a\n\\\n").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
