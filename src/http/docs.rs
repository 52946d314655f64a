//! OpenAPI description of the public routes, served in development only.

use axum::Json;
use serde_json::{json, Value};

use crate::http::forecast::{MAX_TEMPERATURE_C, MIN_TEMPERATURE_C, SUMMARIES};

pub const OPENAPI_PATH: &str = "/openapi.json";

/// OpenAPI 3 document for the service.
pub fn document() -> Value {
    json!({
        "openapi": "3.0.1",
        "info": {
            "title": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/weatherforecast": {
                "get": {
                    "operationId": "GetWeatherForecast",
                    "responses": {
                        "200": {
                            "description": "Five daily forecasts starting tomorrow",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/WeatherForecast" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "WeatherForecast": {
                    "type": "object",
                    "required": ["date", "temperatureC", "temperatureF"],
                    "properties": {
                        "date": { "type": "string", "format": "date" },
                        "temperatureC": {
                            "type": "integer",
                            "format": "int32",
                            "minimum": MIN_TEMPERATURE_C,
                            "maximum": MAX_TEMPERATURE_C
                        },
                        "temperatureF": { "type": "integer", "format": "int32" },
                        "summary": {
                            "type": "string",
                            "nullable": true,
                            "enum": SUMMARIES
                        }
                    }
                }
            }
        }
    })
}

pub async fn openapi() -> Json<Value> {
    Json(document())
}
