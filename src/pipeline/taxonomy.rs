//! Feature taxonomy - static classification of every column by feature type
//!
//! The taxonomy is an immutable value: every change (adding competency
//! columns, dropping columns, collapsing string categoricals after SMOTE-NC)
//! returns a new taxonomy.

use std::collections::BTreeSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Boolean dropout label
pub const DROPOUT_COLUMN: &str = "DROPOUT";

/// Ordinal competency level 0..=5 underlying the dropout label
pub const LEVEL_COLUMN: &str = "LIVELLI";

const CONTINUOUS: &[&str] = &[
    "voto_scritto_ita",
    "voto_orale_ita",
    "voto_scritto_mat",
    "voto_orale_mat",
    "pu_ma_gr",
    "pu_ma_no",
    "Fattore_correzione_new",
    "Cheating",
    "WLE_MAT",
    "WLE_MAT_200",
    "WLE_MAT_200_CORR",
    "pu_ma_no_corr",
];

const ORDINAL: &[&str] = &["n_stud_prev", "n_classi_prev"];

const INT_CATEGORICAL: &[&str] = &[
    "CODICE_SCUOLA",
    "CODICE_PLESSO",
    "CODICE_CLASSE",
    "campione",
    "prog",
];

const STR_CATEGORICAL: &[&str] = &[
    "sesso",
    "mese",
    "anno",
    "luogo",
    "eta",
    "freq_asilo_nido",
    "freq_scuola_materna",
    "luogo_padre",
    "titolo_padre",
    "prof_padre",
    "luogo_madre",
    "titolo_madre",
    "prof_madre",
    "regolarità",
    "cittadinanza",
    "cod_provincia_ISTAT",
    "sigla_provincia_istat",
    "Nome_reg",
    "Cod_reg",
    "Areageo_3",
    "Areageo_4",
    "Areageo_5",
    "Areageo_5_Istat",
];

const BOOLEAN: &[&str] = &["Pon"];

/// Kind of a column as far as encoding and resampling are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Continuous,
    Ordinal,
    IntCategorical,
    StrCategorical,
    Boolean,
    Target,
}

impl FeatureKind {
    /// Whether resampling must vote on this column instead of interpolating it
    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            FeatureKind::IntCategorical
                | FeatureKind::StrCategorical
                | FeatureKind::Boolean
                | FeatureKind::Target
        )
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::Continuous => write!(f, "continuous"),
            FeatureKind::Ordinal => write!(f, "ordinal"),
            FeatureKind::IntCategorical => write!(f, "integer-categorical"),
            FeatureKind::StrCategorical => write!(f, "string-categorical"),
            FeatureKind::Boolean => write!(f, "boolean"),
            FeatureKind::Target => write!(f, "target"),
        }
    }
}

/// Disjoint groups of column names, each kept sorted
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureTaxonomy {
    continuous: BTreeSet<String>,
    ordinal: BTreeSet<String>,
    int_categorical: BTreeSet<String>,
    str_categorical: BTreeSet<String>,
    boolean: BTreeSet<String>,
    target: BTreeSet<String>,
}

fn to_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl FeatureTaxonomy {
    /// Build a taxonomy from explicit groups.
    ///
    /// A name listed in more than one group keeps the first group in the
    /// order target, boolean, int-categorical, str-categorical, ordinal,
    /// continuous.
    pub fn new(
        continuous: &[&str],
        ordinal: &[&str],
        int_categorical: &[&str],
        str_categorical: &[&str],
        boolean: &[&str],
        target: &[&str],
    ) -> Self {
        let mut taxonomy = Self::default();
        for (names, kind) in [
            (target, FeatureKind::Target),
            (boolean, FeatureKind::Boolean),
            (int_categorical, FeatureKind::IntCategorical),
            (str_categorical, FeatureKind::StrCategorical),
            (ordinal, FeatureKind::Ordinal),
            (continuous, FeatureKind::Continuous),
        ] {
            for name in names {
                if taxonomy.kind_of(name).is_none() {
                    taxonomy.group_mut(kind).insert(name.to_string());
                }
            }
        }
        taxonomy
    }

    /// The column classification of the INVALSI mathematics survey export
    pub fn invalsi() -> Self {
        Self {
            continuous: to_set(CONTINUOUS),
            ordinal: to_set(ORDINAL),
            int_categorical: to_set(INT_CATEGORICAL),
            str_categorical: to_set(STR_CATEGORICAL),
            boolean: to_set(BOOLEAN),
            target: to_set(&[DROPOUT_COLUMN, LEVEL_COLUMN]),
        }
    }

    fn group_mut(&mut self, kind: FeatureKind) -> &mut BTreeSet<String> {
        match kind {
            FeatureKind::Continuous => &mut self.continuous,
            FeatureKind::Ordinal => &mut self.ordinal,
            FeatureKind::IntCategorical => &mut self.int_categorical,
            FeatureKind::StrCategorical => &mut self.str_categorical,
            FeatureKind::Boolean => &mut self.boolean,
            FeatureKind::Target => &mut self.target,
        }
    }

    /// Column names of one group, sorted
    pub fn group(&self, kind: FeatureKind) -> Vec<&str> {
        let set = match kind {
            FeatureKind::Continuous => &self.continuous,
            FeatureKind::Ordinal => &self.ordinal,
            FeatureKind::IntCategorical => &self.int_categorical,
            FeatureKind::StrCategorical => &self.str_categorical,
            FeatureKind::Boolean => &self.boolean,
            FeatureKind::Target => &self.target,
        };
        set.iter().map(String::as_str).collect()
    }

    pub fn kind_of(&self, column: &str) -> Option<FeatureKind> {
        [
            FeatureKind::Target,
            FeatureKind::Boolean,
            FeatureKind::IntCategorical,
            FeatureKind::StrCategorical,
            FeatureKind::Ordinal,
            FeatureKind::Continuous,
        ]
        .into_iter()
        .find(|kind| self.group(*kind).contains(&column))
    }

    /// Every non-target column, in a stable order
    pub fn feature_columns(&self) -> Vec<&str> {
        [
            FeatureKind::Boolean,
            FeatureKind::Ordinal,
            FeatureKind::Continuous,
            FeatureKind::IntCategorical,
            FeatureKind::StrCategorical,
        ]
        .into_iter()
        .flat_map(|kind| self.group(kind))
        .collect()
    }

    /// Add competency score columns to the continuous group
    pub fn with_competencies<I, S>(&self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        for tag in tags {
            let tag = tag.as_ref();
            if next.kind_of(tag).is_none() {
                next.continuous.insert(tag.to_string());
            }
        }
        next
    }

    /// Remove columns from whichever group holds them
    pub fn without(&self, columns: &[String]) -> Self {
        let mut next = self.clone();
        for column in columns {
            next.continuous.remove(column);
            next.ordinal.remove(column);
            next.int_categorical.remove(column);
            next.str_categorical.remove(column);
            next.boolean.remove(column);
            next.target.remove(column);
        }
        next
    }

    /// Reclassify every string-categorical column as integer-categorical.
    ///
    /// Used once string categories have been replaced by integer codes.
    pub fn collapse_string_categoricals(&self) -> Self {
        let mut next = self.clone();
        let moved = std::mem::take(&mut next.str_categorical);
        next.int_categorical.extend(moved);
        next
    }

    /// Columns of `df` that the taxonomy does not classify
    pub fn unclassified_columns(&self, df: &DataFrame) -> Vec<String> {
        df.get_column_names()
            .iter()
            .filter(|name| self.kind_of(name.as_str()).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    /// Feature columns the taxonomy expects but `df` lacks
    pub fn missing_features(&self, df: &DataFrame) -> Vec<String> {
        let present: BTreeSet<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        self.feature_columns()
            .into_iter()
            .filter(|name| !present.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Keep only the columns that actually exist in `df`
    pub fn restricted_to(&self, df: &DataFrame) -> Self {
        let present: BTreeSet<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let keep = |set: &BTreeSet<String>| -> BTreeSet<String> {
            set.intersection(&present).cloned().collect()
        };
        Self {
            continuous: keep(&self.continuous),
            ordinal: keep(&self.ordinal),
            int_categorical: keep(&self.int_categorical),
            str_categorical: keep(&self.str_categorical),
            boolean: keep(&self.boolean),
            target: keep(&self.target),
        }
    }
}
