use crate::adapters::finder::DatabaseFinder;
use crate::normalize::HitSchema;
use crate::store::Store;

pub const VERSION: &str = "2.0.4";

static SCHEMA: HitSchema = HitSchema {
    name_field: "virulence_gene",
    extra_fields: &["protein_function"],
    summarize: Store::add_detected_virulence_gene,
};

pub fn service() -> DatabaseFinder {
    DatabaseFinder {
        shim: "VirulenceFinder",
        version: VERSION,
        backend: "virulencefinder",
        ident_param: "vf_i",
        cov_param: "vf_c",
        search_param: "vf_s",
        schema: &SCHEMA,
    }
}
