use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const CURRENCY_CODE: &str = "BRL";
pub const CURRENCY_CODE_LOWER: &str = "brl";

//--------------------------------------       Cents         ---------------------------------------------------------
/// Monetary amounts are stored as an integer number of currency minor units (cents).
///
/// All arithmetic is exact. The only place an amount is ever rounded is [`Cents::seller_share`], which rounds the
/// commission-adjusted share down to the nearest cent.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

macro_rules! money_op {
    (binary $impl_trait:ident, $impl_fn:ident) => {
        impl $impl_trait for Cents {
            type Output = Self;
            fn $impl_fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$impl_fn(rhs.0))
            }
        }
    };

    (inplace $impl_trait:ident, $impl_fn:ident) => {
        impl $impl_trait for Cents {
            fn $impl_fn(&mut self, rhs: Self) {
                self.0.$impl_fn(rhs.0)
            }
        }
    };

    (unary $impl_trait:ident, $impl_fn:ident) => {
        impl $impl_trait for Cents {
            type Output = Self;
            fn $impl_fn(self) -> Self::Output {
                Self(self.0.$impl_fn())
            }
        }
    };
}

money_op!(binary Add, add);
money_op!(binary Sub, sub);
money_op!(inplace AddAssign, add_assign);
money_op!(inplace SubAssign, sub_assign);
money_op!(unary Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {value} is too large to convert to Cents")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl PartialEq for Cents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cents {}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}R${}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_whole(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The portion of a gross sale amount credited to the seller after the platform commission.
    ///
    /// `fee_percent` is an integer percentage in `0..=100`. The result is rounded down to the cent; the remainder
    /// stays with the platform.
    pub fn seller_share(&self, fee_percent: i64) -> Self {
        let pct = fee_percent.clamp(0, 100);
        Self(self.0 * (100 - pct) / 100)
    }
}
