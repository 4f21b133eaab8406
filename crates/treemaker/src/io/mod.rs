//! Stream I/O for trees: the line-delimited text format.
//!
//! Every value sits on its own line. Numbers are plain decimal with floats
//! in fixed-point (10 fractional digits); booleans are the literals `true`
//! and `false`; strings carry backslash escapes for line breaks and
//! backslashes, with the empty string stored as a blank line. Each part
//! record opens with a 4-character tag. References serialize as 1-based
//! part indices, 0 standing for none; owner references carry a discriminant
//! first.
//!
//! Version 5.0 documents read and write; 3.0 and 4.0 read (3.0 translating
//! its inline constraint fields into conditions); 4.0 exports with classic
//! `\r` line endings. Input tolerates `\n`, `\r\n`, and `\r` alike.

mod reader;
mod writer;

use crate::error::{IoError, Result};
use crate::tree::parts::{CreaseKind, FacetColor, Fold, NetFlag};
use crate::tree::Tree;

pub use reader::{read, read_from_string};
pub use writer::{export_v4, write, write_to_string};

pub(crate) const TREE_TAG: &str = "tree";
pub(crate) const NODE_TAG: &str = "node";
pub(crate) const EDGE_TAG: &str = "edge";
pub(crate) const PATH_TAG: &str = "path";
pub(crate) const POLY_TAG: &str = "poly";
pub(crate) const VERTEX_TAG: &str = "vrtx";
pub(crate) const CREASE_TAG: &str = "crse";
pub(crate) const FACET_TAG: &str = "fact";

/// Tags of every condition type this build reads and writes.
pub(crate) const CONDITION_TAGS: &[&str] = &[
    "CNxn", "CNfn", "CNsn", "CNoe", "CNoc", "CNpn", "CNcn", "CNfe", "CNes", "CNxp", "CNap",
    "CNfp", "CNqp",
];

pub(crate) const PART_TAGS: &[&str] = &[
    TREE_TAG, NODE_TAG, EDGE_TAG, PATH_TAG, POLY_TAG, VERTEX_TAG, CREASE_TAG, FACET_TAG,
];

pub(crate) fn crease_kind_to_int(kind: CreaseKind) -> i64 {
    match kind {
        CreaseKind::Axial => 0,
        CreaseKind::Gusset => 1,
        CreaseKind::Ridge => 2,
        CreaseKind::UnfoldedHinge => 3,
        CreaseKind::FoldedHinge => 4,
        CreaseKind::Pseudohinge => 5,
    }
}

pub(crate) fn crease_kind_from_int(v: i64) -> std::result::Result<CreaseKind, IoError> {
    Ok(match v {
        0 => CreaseKind::Axial,
        1 => CreaseKind::Gusset,
        2 => CreaseKind::Ridge,
        3 => CreaseKind::UnfoldedHinge,
        4 => CreaseKind::FoldedHinge,
        5 => CreaseKind::Pseudohinge,
        _ => return Err(IoError::BadToken(v.to_string())),
    })
}

pub(crate) fn fold_to_int(fold: Fold) -> i64 {
    match fold {
        Fold::Flat => 0,
        Fold::Mountain => 1,
        Fold::Valley => 2,
        Fold::Border => 3,
    }
}

pub(crate) fn fold_from_int(v: i64) -> std::result::Result<Fold, IoError> {
    Ok(match v {
        0 => Fold::Flat,
        1 => Fold::Mountain,
        2 => Fold::Valley,
        3 => Fold::Border,
        _ => return Err(IoError::BadToken(v.to_string())),
    })
}

pub(crate) fn color_to_int(color: FacetColor) -> i64 {
    match color {
        FacetColor::NotOriented => 0,
        FacetColor::WhiteUp => 1,
        FacetColor::ColorUp => 2,
    }
}

pub(crate) fn color_from_int(v: i64) -> std::result::Result<FacetColor, IoError> {
    Ok(match v {
        0 => FacetColor::NotOriented,
        1 => FacetColor::WhiteUp,
        2 => FacetColor::ColorUp,
        _ => return Err(IoError::BadToken(v.to_string())),
    })
}

pub(crate) fn net_flag_to_int(flag: NetFlag) -> i64 {
    match flag {
        NetFlag::Ineligible => 0,
        NetFlag::NotYet => 1,
        NetFlag::Added => 2,
    }
}

pub(crate) fn net_flag_from_int(v: i64) -> std::result::Result<NetFlag, IoError> {
    Ok(match v {
        0 => NetFlag::Ineligible,
        1 => NetFlag::NotYet,
        2 => NetFlag::Added,
        _ => return Err(IoError::BadToken(v.to_string())),
    })
}

impl Tree {
    /// Deep copy through the text format.
    pub fn clone_via_serialization(&self) -> Result<Tree> {
        let text = write_to_string(self);
        let mut copy = Tree::new();
        read_from_string(&mut copy, &text)?;
        Ok(copy)
    }
}
