//! Named parameters and parameter lists.
//!
//! A [`Parameter`] names one field of a `params` object and the Rust type it
//! converts to. Parameters are grouped into tuples that implement
//! [`ParameterList`], so a handler declares its signature once:
//!
//! ```
//! use json_rpc_bind::Parameter;
//! use json_rpc_bind::ParameterList;
//! use serde_json::json;
//!
//! let params = (Parameter::<i64>::required("a"), Parameter::optional("b", 0_i64));
//! let object = json!({"a": 3});
//! let (a, b) = params.load(object.as_object().unwrap()).unwrap();
//! assert_eq!((a, b), (3, 0));
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::codes::{self, ErrorCode, RpcResult};
use crate::convert::{ConversionError, FromJson};
use crate::json_type::JsonType;

/// A named parameter with an optional default value.
#[derive(Debug, Clone)]
pub struct Parameter<T> {
    name: String,
    default: Option<T>,
}

impl<T> Parameter<T> {
    /// A parameter that must be present in `params`.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter that falls back to `default` when absent.
    pub fn optional(name: impl Into<String>, default: T) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default_value(&self) -> Option<&T> {
        self.default.as_ref()
    }
}

/// Error for a failed conversion. Element failures name the element, as in
/// `xs[1]`, with the element's actual and expected types.
fn conversion_failure(name: String, error: ConversionError, expected: JsonType) -> ErrorCode {
    match error {
        ConversionError::WrongType(actual) => codes::parameter_wrong_type(&name, actual, expected),
        ConversionError::OutOfRange => codes::parameter_out_of_range(&name, expected),
        ConversionError::Element {
            index,
            expected,
            error,
        } => conversion_failure(format!("{name}[{index}]"), *error, expected),
    }
}

impl<T: FromJson + Clone> Parameter<T> {
    /// Extract and convert this parameter from a `params` object.
    ///
    /// A present field is always converted, even when a default exists. An
    /// absent field yields the default, or `PARAMETER_MISSING`.
    pub fn load(&self, params: &Map<String, Value>) -> RpcResult<T> {
        match params.get(&self.name) {
            Some(value) => {
                T::from_json(value).map_err(|e| conversion_failure(self.name.clone(), e, T::KIND))
            }
            None => self
                .default
                .clone()
                .ok_or_else(|| codes::parameter_missing(&self.name)),
        }
    }
}

impl<T: Serialize> Parameter<T> {
    /// Write `value` into `params` under this parameter's name.
    pub fn store(
        &self,
        params: &mut Map<String, Value>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        params.insert(self.name.clone(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Write the default value into `params`.
    pub fn store_default(&self, params: &mut Map<String, Value>) -> RpcResult<()> {
        let Some(default) = &self.default else {
            return Err(codes::parameter_value_missing(&self.name));
        };
        let value = serde_json::to_value(default)
            .map_err(|e| codes::internal_error(Some(Value::String(e.to_string()))))?;
        params.insert(self.name.clone(), value);
        Ok(())
    }
}

/// An ordered list of parameters, implemented for tuples of [`Parameter`].
///
/// `load` binds the parameters in declaration order and stops at the first
/// failure.
pub trait ParameterList: Send + Sync + 'static {
    /// The converted values, as a tuple in declaration order.
    type Values: Send + 'static;

    fn load(&self, params: &Map<String, Value>) -> RpcResult<Self::Values>;

    fn store(
        &self,
        params: &mut Map<String, Value>,
        values: &Self::Values,
    ) -> Result<(), serde_json::Error>;
}

impl ParameterList for () {
    type Values = ();

    fn load(&self, _params: &Map<String, Value>) -> RpcResult<()> {
        Ok(())
    }

    fn store(
        &self,
        _params: &mut Map<String, Value>,
        _values: &(),
    ) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

macro_rules! parameter_list {
    ($($ty:ident $idx:tt),+) => {
        impl<$($ty),+> ParameterList for ($(Parameter<$ty>,)+)
        where
            $($ty: FromJson + Serialize + Clone + Send + Sync + 'static),+
        {
            type Values = ($($ty,)+);

            fn load(&self, params: &Map<String, Value>) -> RpcResult<Self::Values> {
                Ok(($(self.$idx.load(params)?,)+))
            }

            fn store(
                &self,
                params: &mut Map<String, Value>,
                values: &Self::Values,
            ) -> Result<(), serde_json::Error> {
                $(self.$idx.store(params, &values.$idx)?;)+
                Ok(())
            }
        }
    };
}

parameter_list!(A 0);
parameter_list!(A 0, B 1);
parameter_list!(A 0, B 1, C 2);
parameter_list!(A 0, B 1, C 2, D 3);
parameter_list!(A 0, B 1, C 2, D 3, E 4);
parameter_list!(A 0, B 1, C 2, D 3, E 4, F 5);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::Code;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(o) => o,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn default_fallback() {
        let params = object(json!({"a": 3}));
        assert_eq!(Parameter::optional("b", 0_i64).load(&params), Ok(0));

        let error = Parameter::<i64>::required("b").load(&params).unwrap_err();
        assert_eq!(error, codes::parameter_missing("b"));
    }

    #[test]
    fn present_value_wins_over_default() {
        let params = object(json!({"b": 5}));
        assert_eq!(Parameter::optional("b", 0_i64).load(&params), Ok(5));
    }

    #[test]
    fn wrong_type_and_out_of_range() {
        let params = object(json!({"a": "3", "n": 300}));

        let error = Parameter::<i64>::required("a").load(&params).unwrap_err();
        assert_eq!(error.kind(), Some(Code::ParameterWrongType));
        assert_eq!(
            error.data,
            Some(json!({"name": "a", "actual": "string", "expected": "number"}))
        );

        let params = object(json!({"n": -1}));
        let error = Parameter::<u32>::required("n").load(&params).unwrap_err();
        assert_eq!(error.kind(), Some(Code::ParameterOutOfRange));
    }

    #[test]
    fn array_element_failures_name_the_element() {
        let params = object(json!({"xs": [1, "2"], "grid": [[1], [2, -3]]}));

        let error = Parameter::<Vec<i64>>::required("xs").load(&params).unwrap_err();
        assert_eq!(error.kind(), Some(Code::ParameterWrongType));
        assert_eq!(
            error.data,
            Some(json!({"name": "xs[1]", "actual": "string", "expected": "number"}))
        );

        let error = Parameter::<Vec<Vec<u32>>>::required("grid").load(&params).unwrap_err();
        assert_eq!(error, codes::parameter_out_of_range("grid[1][1]", JsonType::Number));

        let error = Parameter::<Vec<i64>>::required("grid").load(&params).unwrap_err();
        assert_eq!(
            error.data,
            Some(json!({"name": "grid[0]", "actual": "array", "expected": "number"}))
        );
    }

    #[test]
    fn list_loads_in_declaration_order() {
        let list = (
            Parameter::<i64>::required("a"),
            Parameter::<String>::required("b"),
        );
        let error = list.load(&object(json!({}))).unwrap_err();
        assert_eq!(error, codes::parameter_missing("a"));

        let values = list.load(&object(json!({"a": 1, "b": "x"}))).unwrap();
        assert_eq!(values, (1, "x".to_string()));
    }

    #[test]
    fn store_round_trips_through_load() {
        let list = (Parameter::<i64>::required("a"), Parameter::<bool>::required("b"));
        let mut params = Map::new();
        list.store(&mut params, &(4, true)).unwrap();
        assert_eq!(Value::Object(params.clone()), json!({"a": 4, "b": true}));
        assert_eq!(list.load(&params), Ok((4, true)));
    }

    #[test]
    fn store_default_requires_a_default() {
        let mut params = Map::new();
        Parameter::optional("x", 2_i32).store_default(&mut params).unwrap();
        assert_eq!(params["x"], json!(2));

        let error = Parameter::<i32>::required("y").store_default(&mut params).unwrap_err();
        assert_eq!(error.kind(), Some(Code::ParameterValueMissing));
        assert_eq!(
            error.message,
            "No value or default value provided for parameter \"y\""
        );
    }
}
