pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_tests.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_tests.sql")),
				"tables/002_questions.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_questions.sql")),
				"tables/003_knowledge_base.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_knowledge_base.sql")),
				"tables/004_processing_jobs.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_processing_jobs.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_vector_dim_into_knowledge_table() {
		let schema = render_schema(384);

		assert!(schema.contains("vector(384)"));
		assert!(!schema.contains("<VECTOR_DIM>"));
		assert!(schema.contains("CREATE TABLE IF NOT EXISTS tests"));
		assert!(schema.contains("CREATE TABLE IF NOT EXISTS processing_jobs"));
	}
}
