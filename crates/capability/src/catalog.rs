//! The engine's full built-in function catalog.

/// Every built-in the engine knows, before any restriction.
pub const BUILTINS: &[&str] = &[
    // operators and internals
    "assign", "eq", "equal", "neq", "lt", "lte", "gt", "gte", "plus", "minus", "mul", "div",
    "rem", "and", "or", "internal.member_2", "internal.member_3", "internal.print",
    // aggregates
    "count", "sum", "product", "max", "min", "sort", "all", "any",
    // arrays
    "array.concat", "array.slice", "array.reverse",
    // sets
    "intersection", "union", "set_diff",
    // objects
    "object.get", "object.remove", "object.union", "object.union_n", "object.filter",
    "object.subset", "object.keys", "json.filter", "json.remove", "json.patch",
    // strings
    "concat", "contains", "endswith", "format_int", "indexof", "indexof_n", "lower", "replace",
    "split", "sprintf", "startswith", "strings.any_prefix_match", "strings.any_suffix_match",
    "strings.count", "strings.render_template", "strings.replace_n", "strings.reverse",
    "substring", "trim", "trim_left", "trim_prefix", "trim_right", "trim_suffix", "trim_space",
    "upper",
    // numbers
    "abs", "ceil", "floor", "round", "numbers.range", "numbers.range_step", "rand.intn",
    "to_number", "bits.and", "bits.or", "bits.xor", "bits.negate", "bits.lsh", "bits.rsh",
    // regex and glob
    "regex.match", "regex.is_valid", "regex.find_all_string_submatch_n", "regex.find_n",
    "regex.globs_match", "regex.replace", "regex.split", "regex.template_match", "re_match",
    "glob.match", "glob.quote_meta",
    // types
    "is_number", "is_string", "is_boolean", "is_array", "is_set", "is_object", "is_null",
    "type_name", "cast_array", "cast_set", "cast_string", "cast_boolean", "cast_null",
    "cast_object",
    // encoding
    "base64.encode", "base64.decode", "base64.is_valid", "base64url.encode",
    "base64url.encode_no_pad", "base64url.decode", "hex.encode", "hex.decode",
    "urlquery.encode", "urlquery.encode_object", "urlquery.decode", "urlquery.decode_object",
    "json.marshal", "json.marshal_with_options", "json.unmarshal", "json.is_valid",
    "json.verify_schema", "json.match_schema", "yaml.marshal", "yaml.unmarshal", "yaml.is_valid",
    // tokens
    "io.jwt.encode_sign", "io.jwt.encode_sign_raw", "io.jwt.decode", "io.jwt.decode_verify",
    "io.jwt.verify_rs256", "io.jwt.verify_rs384", "io.jwt.verify_rs512", "io.jwt.verify_ps256",
    "io.jwt.verify_ps384", "io.jwt.verify_ps512", "io.jwt.verify_es256", "io.jwt.verify_es384",
    "io.jwt.verify_es512", "io.jwt.verify_eddsa", "io.jwt.verify_hs256", "io.jwt.verify_hs384",
    "io.jwt.verify_hs512",
    // time
    "time.now_ns", "time.parse_ns", "time.parse_rfc3339_ns", "time.parse_duration_ns",
    "time.format", "time.date", "time.clock", "time.weekday", "time.add_date", "time.diff",
    // crypto
    "crypto.md5", "crypto.sha1", "crypto.sha256", "crypto.hmac.md5", "crypto.hmac.sha1",
    "crypto.hmac.sha256", "crypto.hmac.sha512", "crypto.hmac.equal",
    "crypto.x509.parse_certificates", "crypto.x509.parse_and_verify_certificates",
    "crypto.x509.parse_and_verify_certificates_with_options",
    "crypto.x509.parse_certificate_request", "crypto.x509.parse_keypair",
    "crypto.x509.parse_rsa_private_key", "crypto.parse_private_keys",
    // graphs
    "walk", "graph.reachable", "graph.reachable_paths", "graphql.is_valid", "graphql.parse",
    "graphql.parse_and_verify", "graphql.parse_query", "graphql.parse_schema",
    "graphql.schema_is_valid",
    // network
    "http.send", "net.cidr_contains", "net.cidr_contains_matches", "net.cidr_expand",
    "net.cidr_intersects", "net.cidr_is_valid", "net.cidr_merge", "net.cidr_overlap",
    "net.lookup_ip_addr",
    // identifiers and versions
    "uuid.rfc4122", "uuid.parse", "semver.is_valid", "semver.compare",
    // policy introspection
    "rego.parse_module", "rego.metadata.chain", "rego.metadata.rule", "opa.runtime",
    // debugging
    "trace", "print",
    // units and providers
    "units.parse", "units.parse_bytes", "providers.aws.sign_req",
];

/// Built-ins removed from every capability set: both reach the network.
pub const DENYLIST: &[&str] = &["http.send", "net.lookup_ip_addr"];

/// Built-ins rejected under strict compilation.
pub const DEPRECATED: &[&str] = &[
    "any",
    "all",
    "re_match",
    "net.cidr_overlap",
    "set_diff",
    "cast_array",
    "cast_set",
    "cast_string",
    "cast_boolean",
    "cast_null",
    "cast_object",
];

pub fn is_denylisted(name: &str) -> bool {
    DENYLIST.contains(&name)
}

pub fn is_deprecated(name: &str) -> bool {
    DEPRECATED.contains(&name)
}
