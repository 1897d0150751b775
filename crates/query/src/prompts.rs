pub fn build_main_node_prompt(question: &str, node_names: &[String]) -> String {
    format!(
        r#"You extract the main node from a question about a graph database.
The main node is the node most relevant to the question. It must be one of the listed nodes.

Only return the name of the node.

QUESTION: {}

NODES: {}

MAIN NODE:"#,
        question,
        node_names.join(", ")
    )
}

pub fn build_rephrase_prompt(question: &str, main_node: &str, relationships: &[String]) -> String {
    format!(
        r#"Rephrase the question so it names the main node and the relationship of the main node that is relevant to it.

MAIN NODE: {}
RELATIONSHIPS: {}
QUESTION: {}

Only return the rephrased question.

REPHRASED QUESTION:"#,
        main_node,
        relationships.join("\n"),
        question
    )
}

pub fn build_cypher_prompt(question: &str, relationship_types: &[String]) -> String {
    format!(
        r#"Task: Generate a Cypher statement to query the graph database.

SCHEMA:
- Every node has a `name` property.
- (:File)-[:DESCRIBES]->(root entity) and (root entity)-[:HAS_FILE]->(:File)
- (:File)-[:BELONGS_TO]->(:DocumentClass)
- Relationship types: {}

INSTRUCTIONS:
- Use only the relationship types and properties listed above.
- Only read from the graph. Never create, merge, set, delete or remove anything.
- Restrict the match to documents whose File node name is in the parameter $files, e.g. MATCH (f:File)-[:DESCRIBES]->(root) WHERE f.name IN $files
- Return a single column named answer.
- Do not include explanations, apologies or any text other than the Cypher statement.

QUESTION: {}

CYPHER:"#,
        relationship_types.join(", "),
        question
    )
}

pub fn build_answer_prompt(question: &str, results: &str) -> String {
    format!(
        r#"You are a helpful assistant answering questions based on graph query results.

QUESTION: {}

QUERY RESULTS:
{}

INSTRUCTIONS:
- Answer the question using only the query results above
- If the results are empty or do not contain the answer, say you don't know
- Keep your answer concise and factual

ANSWER:"#,
        question, results
    )
}
