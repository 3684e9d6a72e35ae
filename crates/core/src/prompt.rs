//! Prompt templates for role-play and grading.

/// Appended to every persona so replies stay short and in character.
pub const ROLEPLAY_INSTRUCTION: &str =
    "重要: 1〜2文程度で答えてください。病気についての情報は長く話しても良い";

/// System message for the grading request.
pub const EVALUATOR_SYSTEM_PROMPT: &str = "あなたは評価者です。提供された会話履歴を分析し、指定された形式でJSON評価結果のみを返してください。";

/// Grading criteria embedded in the evaluation prompt.
pub const EVALUATION_RUBRIC: &str =
    "評価基準: 患者への共感、苦痛や懸念への対応の適切さ、終末期ケアにおけるコミュニケーション能力。";

/// Builds the system prompt that puts the model in the patient's role.
pub fn roleplay_system_prompt(persona: &str) -> String {
    format!(
        "あなたは以下の設定の末期患者です。患者になりきって応答してください。\n\n{persona}\n\n{ROLEPLAY_INSTRUCTION}"
    )
}

/// Builds the user message asking for a JSON grade of `transcript`.
pub fn evaluation_prompt(persona: &str, transcript: &str) -> String {
    format!(
        "あなたは終末期医療の専門家です。以下の患者設定と会話履歴に基づいて、ユーザー（User）の対応を評価してください。\n\n\
         患者設定:\n{persona}\n\n\
         会話履歴:\n{transcript}\n\
         {EVALUATION_RUBRIC}\n\n\
         以下の形式で評価結果をJSONとして提供してください（他のテキストは含めないでください）:\n\
         {{\n  \"score\": [0から100の整数値],\n  \
         \"review\": \"[評価の短い要約（例: 全体的に共感的でした）]\",\n  \
         \"feedback\": \"[具体的な改善点や良かった点（例: 〇〇の質問は良かったが、△△の懸念にはもっと寄り添えた）]\"\n}}"
    )
}
