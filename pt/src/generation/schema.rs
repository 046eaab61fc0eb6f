//! Response schemas for schema-constrained (image) requests
//!
//! Field-for-field mirrors of the result shapes, in the model API's schema
//! dialect (upper-case type names).

use serde_json::{Value, json};

use crate::domain::Mode;

pub fn for_mode(mode: Mode) -> Value {
    match mode {
        Mode::Itinerary => itinerary(),
        Mode::Board => board(),
    }
}

pub fn itinerary() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "destination": { "type": "STRING" },
            "totalEstimatedCost": { "type": "STRING" },
            "days": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "day": { "type": "INTEGER" },
                        "theme": { "type": "STRING" },
                        "activities": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "time": { "type": "STRING" },
                                    "activity": { "type": "STRING" },
                                    "description": { "type": "STRING" },
                                    "estimatedCost": { "type": "STRING" },
                                    "location": { "type": "STRING" }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

pub fn board() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "concept": { "type": "STRING" },
            "scenes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "INTEGER" },
                        "title": { "type": "STRING" },
                        "visualDescription": { "type": "STRING" },
                        "aestheticNote": { "type": "STRING" },
                        "mood": { "type": "STRING" }
                    }
                }
            }
        }
    })
}
