use serde::Serialize;

/// A dated protocol event worth annotating on a TVL chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Hallmark {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    pub label: &'static str,
}

const HALLMARKS: &[Hallmark] = &[
    Hallmark {
        timestamp: 1597446675,
        label: "CRV Launch",
    },
    Hallmark {
        timestamp: 1621213201,
        label: "Convex Launch",
    },
    Hallmark {
        timestamp: 1642374675,
        label: "MIM depeg",
    },
    Hallmark {
        timestamp: 1651881600,
        label: "UST depeg",
    },
    Hallmark {
        timestamp: 1654822801,
        label: "stETH depeg",
    },
];

/// All hallmarks in chronological order.
pub fn hallmarks() -> &'static [Hallmark] {
    HALLMARKS
}
