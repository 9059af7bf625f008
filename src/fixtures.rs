//! Small two-sample dataset shared by the unit tests
//!
//! sample1: 101 (networked with 102 by cosine, with 103 by deepscore), 102 (blank),
//!          103 (unique, deepscore only), 104 (unique, novelty out of range, no network)
//! sample2: 101, 102

use crate::payload::{
    ChromatogramPayload, Dataset, FeatureGroupsPayload, GroupsPayload, NetworkPayload,
};
use serde_json::json;

pub fn chromatogram() -> ChromatogramPayload {
    serde_json::from_value(json!({
        "sample1": [
            {
                "f_id": 101, "trace_rt": [5.0, 5.5, 6.0], "trace_int": [0.0, 1.0, 0.0],
                "abs_int": 1000.0, "rel_int": 1.0, "rt": 5.5, "rt_avg": 5.55, "mz": 301.1,
                "novelty": 5.0, "blank": false, "samples": ["sample1", "sample2"],
                "f_group": {"site": [{"group1": "siteB", "group2": "siteA", "factor": 2.5}]},
                "f_sample": [{"s_id": "sample1", "value": 1000.0}, {"s_id": "sample2", "value": 400.0}],
                "a_sample": [{"s_id": "sample1", "value": 5000.0}, {"s_id": "sample2", "value": 2000.0}],
                "annotations": {
                    "phenotypes": [{"descr": "active", "score": 0.9, "category": "fraction"}],
                    "matches": [{"id": "BGC0000001", "score": 0.7, "library": "mibig"}],
                    "adducts": [{"adduct_type": "[M+Na]+", "diff_ppm": 1.2, "partner_id": 102}]
                },
                "n_features_cosine": [101, 102], "n_cos_id": 1,
                "n_features_deepscore": [101, 103], "n_ms2d_id": 7
            },
            {
                "f_id": 102, "trace_rt": [7.0, 7.4, 8.0], "trace_int": [0.0, 0.4, 0.0],
                "abs_int": 400.0, "rel_int": 0.4, "rt": 7.4, "rt_avg": 7.45, "mz": 450.2,
                "novelty": 2.0, "blank": true, "samples": ["sample1", "sample2"],
                "n_features_cosine": [101, 102], "n_cos_id": 1,
                "n_features_deepscore": [], "n_ms2d_id": null
            },
            {
                "f_id": 103, "trace_rt": [2.0, 2.5, 3.0], "trace_int": [0.0, 0.7, 0.0],
                "abs_int": 700.0, "rel_int": 0.7, "rt": 2.5, "rt_avg": 2.5, "mz": 800.4,
                "novelty": 8.0, "blank": false, "samples": ["sample1"],
                "annotations": {"phenotypes": [{"descr": "inactive", "score": null}]},
                "n_features_cosine": [], "n_cos_id": null,
                "n_features_deepscore": [101, 103], "n_ms2d_id": 7
            },
            {
                "f_id": 104, "trace_rt": [9.0, 9.5, 10.0], "trace_int": [0.0, 0.2, 0.0],
                "abs_int": 200.0, "rel_int": 0.2, "rt": 9.5, "rt_avg": 9.5, "mz": 120.0,
                "novelty": 11.0, "blank": false, "samples": ["sample1"]
            }
        ],
        "sample2": [
            {
                "f_id": 101, "trace_rt": [5.1, 5.6, 6.1], "trace_int": [0.0, 0.6, 0.0],
                "abs_int": 400.0, "rel_int": 0.6, "rt": 5.6, "rt_avg": 5.55, "mz": 301.1,
                "novelty": 5.0, "blank": false, "samples": ["sample1", "sample2"],
                "n_features_cosine": [101, 102], "n_cos_id": 1,
                "n_features_deepscore": [101, 103], "n_ms2d_id": 7
            },
            {
                "f_id": 102, "trace_rt": [7.0, 7.5, 8.2], "trace_int": [0.0, 1.0, 0.0],
                "abs_int": 900.0, "rel_int": 1.0, "rt": 7.5, "rt_avg": 7.45, "mz": 450.2,
                "novelty": 2.0, "blank": true, "samples": ["sample1", "sample2"],
                "n_features_cosine": [101, 102], "n_cos_id": 1
            }
        ]
    }))
    .expect("fixture chromatogram")
}

pub fn networks() -> NetworkPayload {
    serde_json::from_value(json!({
        "modified_cosine": {
            "1": {"elements": {
                "nodes": [{"data": {"id": 101}}, {"data": {"id": 102}}],
                "edges": [{"data": {"source": 101, "target": 102, "weight": 0.8}}]
            }}
        },
        "ms2deepscore": {
            "7": {"elements": {
                "nodes": [{"data": {"id": 101}}, {"data": {"id": 103}}],
                "edges": [{"data": {"source": 101, "target": 103, "weight": 0.95}}]
            }}
        }
    }))
    .expect("fixture networks")
}

pub fn groups() -> GroupsPayload {
    serde_json::from_value(json!({
        "site": ["siteA", "siteB"],
        "treatment": ["ctrl", "drug"]
    }))
    .expect("fixture groups")
}

pub fn feature_groups() -> FeatureGroupsPayload {
    serde_json::from_value(json!({
        "101": ["siteA"],
        "102": ["siteB"],
        "103": ["siteA", "drug"]
    }))
    .expect("fixture feature groups")
}

pub fn dataset() -> Dataset {
    Dataset::new(chromatogram(), networks(), groups(), feature_groups()).expect("fixture dataset")
}
