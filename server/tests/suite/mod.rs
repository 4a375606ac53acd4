mod gemini;
mod operations;
mod protocol;
