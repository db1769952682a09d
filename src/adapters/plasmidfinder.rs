use crate::adapters::finder::DatabaseFinder;
use crate::normalize::HitSchema;
use crate::store::Store;

pub const VERSION: &str = "2.1.6";

static SCHEMA: HitSchema = HitSchema {
    name_field: "plasmid",
    extra_fields: &["note"],
    summarize: Store::add_detected_plasmid,
};

pub fn service() -> DatabaseFinder {
    DatabaseFinder {
        shim: "PlasmidFinder",
        version: VERSION,
        backend: "plasmidfinder",
        ident_param: "pf_i",
        cov_param: "pf_c",
        search_param: "pf_s",
        schema: &SCHEMA,
    }
}
