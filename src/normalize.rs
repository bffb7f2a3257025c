use crate::data::Table;
use crate::error::ConfigError;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Source header → display name. Keys and values are stored trimmed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenameMap {
    entries: HashMap<String, String>,
    display_names: HashSet<String>,
}

impl RenameMap {
    pub fn new<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries = HashMap::new();
        let mut owners: HashMap<String, String> = HashMap::new();

        for (k, v) in pairs {
            let key = k.as_ref().trim().to_string();
            let display = v.as_ref().trim().to_string();
            if let Some(first) = owners.get(&display) {
                if first != &key {
                    return Err(ConfigError::DuplicateDisplayName {
                        first: first.clone(),
                        second: key,
                        display,
                    });
                }
            }
            owners.insert(display.clone(), key.clone());
            entries.insert(key, display);
        }

        let display_names = entries.values().cloned().collect();
        Ok(Self { entries, display_names })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Display name for a header. Headers that already are display names are
    /// left alone so that a second pass never renames again.
    pub fn rename<'a>(&'a self, header: &'a str) -> &'a str {
        if self.display_names.contains(header) {
            return header;
        }
        self.entries.get(header).map(String::as_str).unwrap_or(header)
    }
}

/// Display aliases for the Seoul commercial-district sales extract.
pub static SEOUL_SALES_RENAMES: Lazy<RenameMap> = Lazy::new(|| {
    RenameMap::new([
        ("기준_년분기_코드", "기준분기"),
        ("자치구_코드", "자치구코드"),
        ("자치구_코드_명", "자치구명"),
        ("행정동_코드", "행정동코드"),
        ("행정동_코드_명", "행정동명"),
        ("상권_구분_코드_명", "상권구분"),
        ("상권_코드_명", "상권명"),
        ("서비스_업종_코드", "업종코드"),
        ("서비스_업종_코드_명", "업종명"),
        ("당월_매출_금액", "월매출액"),
        ("당월_매출_건수", "월매출건수"),
        ("주중_매출_금액", "주중매출액"),
        ("주말_매출_금액", "주말매출액"),
        ("남성_매출_금액", "남성매출액"),
        ("여성_매출_금액", "여성매출액"),
        ("점포_수", "점포수"),
    ])
    .unwrap_or_default()
});

/// Trim header whitespace, then apply `renames`. Cell values and row order
/// are untouched.
pub fn normalize(table: Table, renames: Option<&RenameMap>) -> Table {
    let headers = table
        .headers
        .iter()
        .map(|h| {
            let trimmed = h.trim();
            match renames {
                Some(map) => map.rename(trimmed).to_string(),
                None => trimmed.to_string(),
            }
        })
        .collect();

    Table {
        headers,
        rows: table.rows,
    }
}
