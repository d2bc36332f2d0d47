use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// A single namelist value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Zero of the same kind, used when masking per-domain values
    pub fn zeroed(&self) -> Value {
        match self {
            Value::Bool(_) => Value::Bool(false),
            Value::Int(_) => Value::Int(0),
            Value::Float(_) => Value::Float(0.0),
            Value::Str(_) => Value::Str(String::new()),
        }
    }
}

impl fmt::Display for Value {
    /// Fortran namelist representation
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, ".true."),
            Value::Bool(false) => write!(f, ".false."),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// A configuration field which is either a single value or one value per domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field<T = Value> {
    Scalar(T),
    PerDomain(Vec<T>),
}

impl<T> Field<T> {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Field::Scalar(_))
    }

    /// Number of values held, a scalar counting as one
    pub fn len(&self) -> usize {
        match self {
            Field::Scalar(_) => 1,
            Field::PerDomain(xs) => xs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values as a slice-like vector, a scalar becoming a single element
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        match self {
            Field::Scalar(x) => vec![x.clone()],
            Field::PerDomain(xs) => xs.clone(),
        }
    }

    pub fn first(&self) -> Option<&T> {
        match self {
            Field::Scalar(x) => Some(x),
            Field::PerDomain(xs) => xs.first(),
        }
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> Field<U> {
        match self {
            Field::Scalar(x) => Field::Scalar(f(x)),
            Field::PerDomain(xs) => Field::PerDomain(xs.iter().map(f).collect()),
        }
    }
}

impl Field {
    pub fn scalar<V: Into<Value>>(v: V) -> Self {
        Field::Scalar(v.into())
    }

    pub fn per_domain<V: Into<Value>, I: IntoIterator<Item = V>>(values: I) -> Self {
        Field::PerDomain(values.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for Field {
    fn from(v: Value) -> Self {
        Field::Scalar(v)
    }
}

impl From<Vec<Value>> for Field {
    fn from(vs: Vec<Value>) -> Self {
        Field::PerDomain(vs)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Scalar(v) => write!(f, "{}", v),
            Field::PerDomain(vs) => {
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
        }
    }
}
