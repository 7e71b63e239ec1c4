//! Plain-text rendering of workflows and jobs.

use std::collections::HashSet;

use docflow_core::view::{
    filter_by_status, format_duration, format_score, format_time, running_ids, status_icon,
};
use docflow_core::{JobStatus, Task, TaskId, TaskStatus, WorkflowStatus};

/// Header, statistics and the task tree. Running tasks are expanded.
pub fn print_workflow(workflow: &WorkflowStatus) {
    let stats = &workflow.statistics;
    println!(
        "Workflow {}  [{}]  {}%",
        workflow.workflow_id, workflow.status, workflow.overall_progress
    );
    println!(
        "  Tasks: {}/{} completed, {} running, {} pending, {} failed   avg score {}   ETA {}",
        stats.completed,
        stats.total,
        stats.running,
        stats.pending,
        stats.failed,
        format_score(Some(stats.average_score)),
        format_duration(stats.estimated_time_remaining),
    );

    let forest = workflow.forest();
    let expanded = running_ids(&forest);
    for task in &forest {
        print_task(task, 1, &expanded, true);
    }
}

fn print_task(task: &Task, depth: usize, expanded: &HashSet<TaskId>, top_level: bool) {
    println!("{}{}", "  ".repeat(depth), task_line(task));

    if task.children.is_empty() {
        return;
    }
    if top_level || expanded.contains(&task.id) {
        for child in &task.children {
            print_task(child, depth + 1, expanded, false);
        }
    } else {
        println!("{}  ({} subtasks)", "  ".repeat(depth), task.children.len());
    }
}

fn task_line(task: &Task) -> String {
    let mut line = format!("{} {} ({})", status_icon(task.status), task.name, task.kind);
    if task.status == TaskStatus::Running {
        if let Some(progress) = task.progress {
            line.push_str(&format!("  {}%", progress));
        }
    }
    if task.score.is_some() {
        line.push_str(&format!("  score {}", format_score(task.score)));
    }
    if let Some(start) = &task.start_time {
        line.push_str(&format!("  {}", format_time(start)));
        if let Some(end) = &task.end_time {
            line.push_str(&format!(" - {}", format_time(end)));
        }
    }
    line
}

/// One line for a task that just changed.
pub fn print_task_change(workflow: &WorkflowStatus, id: &TaskId) {
    if let Some(task) = workflow.tasks.get(id) {
        println!(
            "{:>3}%  {}",
            workflow.overall_progress,
            task_line(task)
        );
    }
}

/// List failed tasks with their errors.
pub fn print_failures(workflow: &WorkflowStatus) {
    let forest = workflow.forest();
    let failed = filter_by_status(&forest, TaskStatus::Failed);
    if failed.is_empty() {
        return;
    }
    println!("Failures ({}):", failed.len());
    for task in failed {
        println!(
            "  {} {}: {}",
            status_icon(task.status),
            task.name,
            task.error.as_deref().unwrap_or("no error message")
        );
    }
}

pub fn print_job(job: &JobStatus) {
    let mut line = format!("[{}] {:>3}%  {}", job.stage, job.progress, job.message);
    if let (Some(done), Some(total)) = (job.completed_steps, job.total_steps) {
        line.push_str(&format!("  ({}/{})", done, total));
    }
    if let Some(step) = &job.current_step {
        line.push_str(&format!("  {}", step));
    }
    if let Some(eta) = job.estimated_time_remaining.filter(|eta| *eta > 0) {
        line.push_str(&format!("  ETA {}", format_duration(eta)));
    }
    println!("{}", line);
}

/// Final job summary: details, PDF link and document size.
pub fn print_job_result(job: &JobStatus, base_url: &str) {
    for detail in &job.details {
        println!("  - {}", detail);
    }
    if let Some(pdf) = &job.pdf_url {
        println!("PDF: {}{}", base_url, pdf);
    }
    if let Some(html) = &job.doc_html {
        println!("Document: {} bytes of HTML", html.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_line_shows_progress_only_while_running() {
        let mut task = Task::new("t1", "TopicSentenceTask", "topic_sentence")
            .with_status(TaskStatus::Running);
        task.progress = Some(50);
        assert_eq!(task_line(&task), "◐ TopicSentenceTask (topic_sentence)  50%");

        let task = task.with_status(TaskStatus::Completed).with_score(0.8);
        assert_eq!(task_line(&task), "● TopicSentenceTask (topic_sentence)  score 0.80");
    }
}
