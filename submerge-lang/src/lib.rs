#![allow(dead_code)]
use ordered_float::OrderedFloat;
use serde::{Serialize, Deserialize};




// When doing columnar evaluation
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Vals {
    I64s(Vec<i64>),
    F64s(Vec<OrderedFloat<f64>>),
    Bits(bs::Bs),
    Bins(Vec<Bin>),
    Rich(Box<Col>),           // Vals enriched with label, unit and form
    All(Vec<Vals>),           // Disjoint intersection (statically type-enforced)
    Any(Vec<i64>, Vec<Vals>), // Disjoint union (dynamically indexed)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Bin {
    block: i64,
    entry: i64,
}

impl Bin {
    pub fn new(block: i64, entry: i64) -> Self {
        Bin { block, entry }
    }
}

// A word is a bin that at least (a) is UTF-8 and (b) complies with UAX#31
// XID_Start XID_Continue* as well as as many restrictions as reasonable from
// UAX#39 (eg. single-script, general security profile, confusible) with an
// added ability to mark a realm, table or column as ASCII-only.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Word(Bin);

impl Word {
    pub fn new(bin: Bin) -> Self {
        Word(bin)
    }
}

// A form describes additional representational details for a Val type, such as
// the data encoding of a Bin, or a decimal precision for a fixed-point I64.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Form(i64);

// A unit describes the physical, logical, or cultural units employed by the
// column if the column is numeric.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Unit(i64);

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Col {
    name: Word,
    form: Form,
    unit: Unit,
    vals: Vals,
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Tab {
    cols: Vec<Col>,
}

// A path designates a given Col within a (nested)
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Path(pub Vec<Word>);

// An Expr is an expresison in a modified Ei-calculus. It is tree-structured
// for ease of performing synchronous operations like typechecking.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Expr {
    Pass,
}
