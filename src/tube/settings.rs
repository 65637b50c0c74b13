use serde::{Serialize, Deserialize};
use serde_json::{Value, json};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use crate::basis::BasisKind;
use crate::error::TubeError;
use crate::fit::{ModelType, DEFAULT_MAX_ITERATIONS, check_ngaus, check_nbasis};

/// Construction settings of a tube: the number of control points and the estimator.
///
/// Settings can also be read from a JSON object:
///
/// ```json
/// { "model_type" : "EM", "ngaus" : 100, "basis_type" : "bernstein", "nbasis" : 5 }
/// ```
///
/// model_type is one of "resampling", "ML" or "EM". basis_type ("gaussian" or "bernstein")
/// and nbasis are required by ML and EM; EM also accepts an optional max_iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {

    pub ngaus : usize,

    pub model : ModelType

}

impl Settings {

    pub fn resampling(ngaus : usize) -> Self {
        Self { ngaus, model : ModelType::Resampling }
    }

    pub fn maximum_likelihood(ngaus : usize, basis : BasisKind, nbasis : usize) -> Self {
        Self { ngaus, model : ModelType::MaximumLikelihood { basis, nbasis } }
    }

    pub fn expectation_maximization(ngaus : usize, basis : BasisKind, nbasis : usize) -> Self {
        Self {
            ngaus,
            model : ModelType::ExpectationMaximization { basis, nbasis, max_iterations : DEFAULT_MAX_ITERATIONS }
        }
    }

    /// Changes the iteration budget (only meaningful for expectation-maximization).
    pub fn max_iterations(mut self, n : usize) -> Self {
        if let ModelType::ExpectationMaximization { ref mut max_iterations, .. } = self.model {
            *max_iterations = n;
        }
        self
    }

    pub fn validate(&self) -> Result<(), TubeError> {
        check_ngaus(self.ngaus)?;
        match self.model {
            ModelType::Resampling => Ok(()),
            ModelType::MaximumLikelihood { nbasis, .. } => check_nbasis(nbasis),
            ModelType::ExpectationMaximization { nbasis, max_iterations, .. } => {
                check_nbasis(nbasis)?;
                if max_iterations == 0 {
                    return Err(TubeError::config("max_iterations should be positive"));
                }
                Ok(())
            }
        }
    }

    pub fn from_json(val : &Value) -> Result<Self, TubeError> {
        if !val.is_object() {
            return Err(TubeError::config("settings should be a JSON object"));
        }
        let ngaus = get_count(val, "ngaus")?;
        let settings = match get_str(val, "model_type")? {
            "resampling" => Settings::resampling(ngaus),
            "ML" => {
                let basis : BasisKind = get_str(val, "basis_type")?.parse()?;
                Settings::maximum_likelihood(ngaus, basis, get_count(val, "nbasis")?)
            },
            "EM" => {
                let basis : BasisKind = get_str(val, "basis_type")?.parse()?;
                let s = Settings::expectation_maximization(ngaus, basis, get_count(val, "nbasis")?);
                match val.get("max_iterations") {
                    Some(_) => s.max_iterations(get_count(val, "max_iterations")?),
                    None => s
                }
            },
            other => return Err(TubeError::config(format!("unknown model_type '{}'", other)))
        };
        settings.validate()?;
        Ok(settings)
    }

}

fn get_str<'a>(val : &'a Value, key : &str) -> Result<&'a str, TubeError> {
    val.get(key)
        .ok_or_else(|| TubeError::config(format!("missing key '{}'", key)) )?
        .as_str()
        .ok_or_else(|| TubeError::config(format!("'{}' should be a string", key)) )
}

fn get_count(val : &Value, key : &str) -> Result<usize, TubeError> {
    let n = val.get(key)
        .ok_or_else(|| TubeError::config(format!("missing key '{}'", key)) )?
        .as_u64()
        .ok_or_else(|| TubeError::config(format!("'{}' should be a non-negative integer", key)) )?;
    usize::try_from(n).map_err(|_| TubeError::config(format!("'{}' is too large", key)) )
}

impl TryFrom<Value> for Settings {

    type Error = TubeError;

    fn try_from(val : Value) -> Result<Self, TubeError> {
        Settings::from_json(&val)
    }

}

impl FromStr for Settings {

    type Err = TubeError;

    fn from_str(s : &str) -> Result<Self, TubeError> {
        let v : Value = serde_json::from_str(s)
            .map_err(|e| TubeError::config(format!("{}", e)) )?;
        Settings::from_json(&v)
    }

}

impl From<Settings> for Value {

    fn from(s : Settings) -> Value {
        let basis_name = |b : BasisKind| match b {
            BasisKind::Gaussian => "gaussian",
            BasisKind::Bernstein => "bernstein"
        };
        match s.model {
            ModelType::Resampling => json!({ "model_type" : "resampling", "ngaus" : s.ngaus }),
            ModelType::MaximumLikelihood { basis, nbasis } => json!({
                "model_type" : "ML",
                "ngaus" : s.ngaus,
                "basis_type" : basis_name(basis),
                "nbasis" : nbasis
            }),
            ModelType::ExpectationMaximization { basis, nbasis, max_iterations } => json!({
                "model_type" : "EM",
                "ngaus" : s.ngaus,
                "basis_type" : basis_name(basis),
                "nbasis" : nbasis,
                "max_iterations" : max_iterations
            })
        }
    }

}

impl fmt::Display for Settings {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        let v : Value = (*self).into();
        write!(f, "{}", v)
    }

}
